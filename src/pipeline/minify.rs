// src/pipeline/minify.rs

//! Conservative minifiers for style sheets, scripts and HTML.
//!
//! These strip comments and collapse whitespace; they do not rewrite
//! tokens. Structural problems (unterminated comments or strings, unbalanced
//! brackets) are reported as errors so a malformed source never produces a
//! silently broken artifact.

use std::path::Path;

use crate::types::MediaType;

/// Which minifier applies to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Css,
    Script,
    Html,
}

impl Dialect {
    /// Pick a dialect from the media type, falling back to the file
    /// extension for untyped (`text` / `any`) buffers.
    pub fn detect(media: MediaType, name: &Path) -> Option<Self> {
        match media {
            MediaType::Css => Some(Dialect::Css),
            MediaType::Script => Some(Dialect::Script),
            MediaType::Html => Some(Dialect::Html),
            _ => match name.extension().and_then(|e| e.to_str()) {
                Some("css" | "scss") => Some(Dialect::Css),
                Some("js" | "mjs" | "cjs") => Some(Dialect::Script),
                Some("html" | "htm") => Some(Dialect::Html),
                _ => None,
            },
        }
    }
}

pub fn minify(src: &str, dialect: Dialect) -> Result<String, String> {
    match dialect {
        Dialect::Css => minify_css(src),
        Dialect::Script => minify_script(src),
        Dialect::Html => minify_html(src),
    }
}

/// Copy a quoted string starting at `chars[i]` into `out`; returns the index
/// after the closing quote.
fn copy_string(
    chars: &[char],
    mut i: usize,
    out: &mut String,
    allow_newline: bool,
) -> Result<usize, String> {
    let quote = chars[i];
    out.push(quote);
    i += 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        match c {
            '\\' if i + 1 < chars.len() => {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            '\n' if !allow_newline => return Err("unterminated string literal".to_string()),
            c if c == quote => return Ok(i + 1),
            _ => {}
        }
        i += 1;
    }
    Err("unterminated string literal".to_string())
}

/// Skip a `/* ... */` comment starting at `chars[i]`.
fn skip_block_comment(chars: &[char], i: usize) -> Result<usize, String> {
    let mut j = i + 2;
    while j + 1 < chars.len() {
        if chars[j] == '*' && chars[j + 1] == '/' {
            return Ok(j + 2);
        }
        j += 1;
    }
    Err("unterminated block comment".to_string())
}

fn minify_css(src: &str) -> Result<String, String> {
    const TIGHT: &[char] = &['{', '}', ';', ',', '>'];

    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut pending_space = false;
    let mut depth: usize = 0;
    let mut parens: usize = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i = skip_block_comment(&chars, i)?;
            pending_space = true;
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }

        if pending_space {
            if let Some(last) = out.chars().last() {
                let drop = TIGHT.contains(&last)
                    || TIGHT.contains(&c)
                    || (depth > 0 && last == ':');
                if !drop {
                    out.push(' ');
                }
            }
            pending_space = false;
        }

        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out, false)?;
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unexpected '}'".to_string())?;
                if out.ends_with(';') {
                    out.pop();
                }
            }
            '(' => parens += 1,
            ')' => {
                parens = parens
                    .checked_sub(1)
                    .ok_or_else(|| "unexpected ')'".to_string())?;
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }

    if depth > 0 {
        return Err(format!("{depth} unclosed '{{'"));
    }
    if parens > 0 {
        return Err(format!("{parens} unclosed '('"));
    }
    Ok(out)
}

fn minify_script(src: &str) -> Result<String, String> {
    // Spaces next to these can go; `+` and `-` are excluded (`a - -b`).
    const TIGHT: &[char] = &['{', '}', '(', ')', '[', ']', ';', ',', ':', '=', '<', '>', '?', '&', '|'];

    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut stack: Vec<char> = Vec::new();
    // None: no pending whitespace; Some(true): the run contained a newline.
    let mut pending: Option<bool> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i = skip_block_comment(&chars, i)?;
            pending.get_or_insert(false);
            continue;
        }
        if c.is_whitespace() {
            let newline = c == '\n';
            pending = Some(pending.unwrap_or(false) || newline);
            i += 1;
            continue;
        }

        if let Some(newline) = pending.take() {
            if let Some(last) = out.chars().last() {
                if newline {
                    // Keep line breaks where automatic semicolon insertion
                    // could depend on them.
                    if !matches!(last, '{' | ';' | ',' | '(' | '[') && !matches!(c, '}' | ')' | ']' | ';' | ',') {
                        out.push('\n');
                    }
                } else if !TIGHT.contains(&last) && !TIGHT.contains(&c) {
                    out.push(' ');
                }
            }
        }

        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out, false)?;
                continue;
            }
            '`' => {
                i = copy_string(&chars, i, &mut out, true)?;
                continue;
            }
            '\\' if i + 1 < chars.len() => {
                out.push(c);
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err(format!("unbalanced '{c}'"));
                }
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed '{open}'"));
    }
    Ok(out)
}

/// Elements whose content is copied verbatim.
const RAW_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

fn raw_element_at(rest: &str) -> Option<&'static str> {
    let tag = rest.strip_prefix('<')?;
    RAW_ELEMENTS.iter().copied().find(|name| {
        tag.get(..name.len())
            .is_some_and(|t| t.eq_ignore_ascii_case(name))
            && tag[name.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c.is_whitespace())
    })
}

fn minify_html(src: &str) -> Result<String, String> {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    // None: no pending whitespace; Some(true): the run contained a newline.
    let mut pending: Option<bool> = None;

    while let Some(c) = rest.chars().next() {
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body
                .find("-->")
                .ok_or_else(|| "unterminated HTML comment".to_string())?;
            rest = &body[end + 3..];
            pending.get_or_insert(false);
            continue;
        }
        if c.is_whitespace() {
            pending = Some(pending.unwrap_or(false) || c == '\n');
            rest = &rest[c.len_utf8()..];
            continue;
        }

        if let Some(newline) = pending.take() {
            let between_tags = out.ends_with('>') && c == '<';
            if !out.is_empty() && !(newline && between_tags) {
                out.push(' ');
            }
        }

        if let Some(name) = raw_element_at(rest) {
            let lower = rest.to_ascii_lowercase();
            let close = format!("</{name}");
            let close_at = lower
                .find(&close)
                .ok_or_else(|| format!("unclosed <{name}> element"))?;
            let end = lower[close_at..]
                .find('>')
                .map(|e| close_at + e + 1)
                .ok_or_else(|| format!("unclosed <{name}> element"))?;
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_drops_comments_and_redundant_whitespace() {
        let src = "/* header */\nbody {\n  color: red;\n  margin : 0 auto;\n}\n\na > b , c { top: 1px }\n";
        let out = minify(src, Dialect::Css).unwrap();
        assert_eq!(out, "body{color:red;margin :0 auto}a>b,c{top:1px}");
    }

    #[test]
    fn css_keeps_strings_verbatim() {
        let out = minify("a::after { content: \"  } \"; }", Dialect::Css).unwrap();
        assert_eq!(out, "a::after{content:\"  } \"}");
    }

    #[test]
    fn css_rejects_unbalanced_braces() {
        assert!(minify("a { color: red;", Dialect::Css).is_err());
        assert!(minify("a { color: red; }}", Dialect::Css).is_err());
        assert!(minify("a { /* oops ", Dialect::Css).is_err());
    }

    #[test]
    fn script_strips_comments_and_keeps_asi_newlines() {
        let src = "// leading\nconst a = 1\nconst b = a + 2 /* inline */\n\nfunction f ( x ) {\n  return x\n}\n";
        let out = minify(src, Dialect::Script).unwrap();
        assert_eq!(out, "const a=1\nconst b=a + 2\nfunction f(x){return x}");
    }

    #[test]
    fn script_does_not_touch_comment_markers_in_strings() {
        let out = minify("const u = \"http://x\" // c\n", Dialect::Script).unwrap();
        assert_eq!(out, "const u=\"http://x\"");
    }

    #[test]
    fn script_rejects_mismatched_brackets() {
        assert!(minify("function f() { return [1, 2) }", Dialect::Script).is_err());
        assert!(minify("let s = 'open", Dialect::Script).is_err());
    }

    #[test]
    fn html_collapses_whitespace_and_preserves_pre() {
        let src = "<!-- c -->\n<ul>\n  <li>a   b</li>\n</ul>\n<pre>  keep\n  me </pre>\n";
        let out = minify(src, Dialect::Html).unwrap();
        assert_eq!(out, "<ul><li>a b</li></ul><pre>  keep\n  me </pre>");
    }

    #[test]
    fn html_rejects_unterminated_comment() {
        assert!(minify("<p>x</p><!-- never closed", Dialect::Html).is_err());
    }

    #[test]
    fn dialect_falls_back_to_extension() {
        assert_eq!(
            Dialect::detect(MediaType::Any, Path::new("app.js")),
            Some(Dialect::Script)
        );
        assert_eq!(Dialect::detect(MediaType::Text, Path::new("logo.png")), None);
    }
}

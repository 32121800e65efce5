use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Category of source files sharing one pattern set and one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetClass {
    Html,
    Script,
    Style,
    Image,
    Font,
}

impl AssetClass {
    pub const ALL: [AssetClass; 5] = [
        AssetClass::Html,
        AssetClass::Script,
        AssetClass::Style,
        AssetClass::Image,
        AssetClass::Font,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Html => "html",
            AssetClass::Script => "script",
            AssetClass::Style => "style",
            AssetClass::Image => "image",
            AssetClass::Font => "font",
        }
    }

    /// Media type of freshly read source files of this class.
    pub fn source_media(&self) -> MediaType {
        match self {
            AssetClass::Html => MediaType::Html,
            AssetClass::Script => MediaType::Script,
            AssetClass::Style => MediaType::Css,
            AssetClass::Image => MediaType::Image,
            AssetClass::Font => MediaType::Font,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(AssetClass::Html),
            "script" | "js" => Ok(AssetClass::Script),
            "style" | "css" => Ok(AssetClass::Style),
            "image" | "img" => Ok(AssetClass::Image),
            "font" | "fonts" => Ok(AssetClass::Font),
            other => Err(format!(
                "invalid asset class: {other} (expected one of html, script, style, image, font)"
            )),
        }
    }
}

/// Media type flowing between pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Html,
    Css,
    Script,
    Image,
    Font,
    Text,
    #[default]
    Any,
}

impl MediaType {
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            MediaType::Html | MediaType::Css | MediaType::Script | MediaType::Text
        )
    }

    /// Whether a stage declaring `self` as its input can consume data of
    /// media type `produced`.
    pub fn accepts(&self, produced: MediaType) -> bool {
        match (self, produced) {
            (MediaType::Any, _) | (_, MediaType::Any) => true,
            (MediaType::Text, p) => p.is_textual(),
            (a, b) => *a == b,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaType::Html => "html",
            MediaType::Css => "css",
            MediaType::Script => "script",
            MediaType::Image => "image",
            MediaType::Font => "font",
            MediaType::Text => "text",
            MediaType::Any => "any",
        };
        f.write_str(s)
    }
}

/// Where cache entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Persist entries in `.assetflow/cache` across restarts.
    File,
    /// Keep entries for the lifetime of the process only.
    Memory,
    /// Disable the cache layer; every input is processed on every run.
    Off,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_class_parses_aliases() {
        assert_eq!("css".parse::<AssetClass>(), Ok(AssetClass::Style));
        assert_eq!(" Image ".parse::<AssetClass>(), Ok(AssetClass::Image));
        assert!("video".parse::<AssetClass>().is_err());
    }

    #[test]
    fn text_accepts_textual_media_only() {
        assert!(MediaType::Text.accepts(MediaType::Css));
        assert!(MediaType::Text.accepts(MediaType::Any));
        assert!(!MediaType::Text.accepts(MediaType::Image));
        assert!(!MediaType::Css.accepts(MediaType::Script));
        assert!(MediaType::Any.accepts(MediaType::Font));
    }
}

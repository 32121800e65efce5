mod common;

use std::path::PathBuf;

use assetflow_test_utils::fixture::ProjectFixture;
use assetflow_test_utils::init_tracing;
use common::Session;

const BUNDLE_CONFIG: &str = r#"
[config]
cache = "memory"

[asset.style]
src = ["src/css/*.css"]
dest = "dist/css"

[task.bundleCss]
asset = "style"
stages = [{ kind = "concat", file = "styles.min.css" }, { kind = "minify" }]
"#;

#[tokio::test]
async fn concat_and_minify_produce_one_bundle_and_skip_on_rerun() {
    init_tracing();
    let fx = ProjectFixture::new();
    let a = "a {\n  color: red;\n}\n";
    let b = "/* blue */\nb {\n  color: blue;\n}\n";
    fx.write("src/css/a.css", a).write("src/css/b.css", b);
    let session = Session::open(&fx.config(BUNDLE_CONFIG), false);

    let first = session.build().await;
    assert!(first.success());
    assert_eq!(first.invocations(), 2);

    let bundle = fx.read("dist/css/styles.min.css");
    assert!(bundle.len() <= a.len() + b.len());
    let text = String::from_utf8(bundle).unwrap();
    assert!(text.find("a{color:red}").unwrap() < text.find("b{color:blue}").unwrap());
    assert_eq!(fx.snapshot("dist/css").len(), 1);

    let second = session.build().await;
    assert!(second.success());
    assert_eq!(second.invocations(), 0);
    let report = second.report("bundleCss").unwrap();
    assert_eq!(report.reused, vec![fx.path("dist/css/styles.min.css")]);
}

#[tokio::test]
async fn one_malformed_file_out_of_five() {
    let fx = ProjectFixture::new();
    for name in ["a", "c", "d", "e"] {
        fx.write(&format!("src/css/{name}.css"), format!("{name} {{ margin: 0; }}"));
    }
    fx.write("src/css/b.css", "b { margin: 0;");
    let config = fx.config(
        r#"
        [asset.style]
        src = ["src/css/*.css"]
        dest = "dist/css"

        [task.css]
        asset = "style"
        stages = [{ kind = "minify" }]
        "#,
    );
    let session = Session::open(&config, false);

    let run = session.build().await;
    let report = run.report("css").unwrap();
    assert!(!report.success);
    assert!(!run.success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file, fx.path("src/css/b.css"));
    assert_eq!(report.failures[0].stage, "minify");
    assert_eq!(report.artifacts.len(), 4);
    assert!(!fx.exists("dist/css/b.css"));

    // Notified once with everything that was written.
    assert_eq!(session.sink.batches(), vec![report.artifacts.clone()]);
}

#[tokio::test]
async fn clean_then_build_matches_building_twice() {
    let fx = ProjectFixture::new();
    fx.write("src/js/app.js", "// app\nconst a = 1;\n")
        .write("src/js/lib/util.js", "function util(x) {\n  return x;\n}\n")
        .write("src/index.html", "<html>\n  <body>  hi </body>\n</html>\n");
    let config = fx.config(
        r#"
        [config]
        cache = "file"

        [asset.script]
        src = ["src/js/**/*.js"]
        dest = "dist/js"

        [asset.html]
        src = ["src/*.html"]
        dest = "dist"

        [task.js]
        asset = "script"
        stages = [{ kind = "minify" }]

        [task.html]
        asset = "html"
        stages = [{ kind = "minify" }]

        [task.dist]
        after = ["js", "html"]
        "#,
    );

    let session = Session::open(&config, false);
    session.build().await;
    session.build().await;
    let twice = fx.snapshot("dist");
    assert_eq!(twice.len(), 3);
    assert!(twice.contains_key(&PathBuf::from("js/lib/util.js")));

    session.clean();
    assert!(!fx.exists("dist"));
    assert!(!fx.exists(".assetflow/cache"));

    let rebuilt = session.build().await;
    assert_eq!(rebuilt.invocations(), 3);
    assert_eq!(fx.snapshot("dist"), twice);
}

#[tokio::test]
async fn disabling_the_cache_only_changes_invocation_counts() {
    let fx = ProjectFixture::new();
    fx.write("src/css/a.css", "a { color: red; }")
        .write("src/css/b.css", "b { color: blue; }");
    let config = fx.config(BUNDLE_CONFIG);

    let cached = Session::open(&config, false);
    cached.build().await;
    let second_cached = cached.build().await;
    let with_cache = fx.snapshot("dist");

    cached.clean();
    let uncached = Session::open(&config, true);
    uncached.build().await;
    let second_uncached = uncached.build().await;

    assert_eq!(fx.snapshot("dist"), with_cache);
    assert_eq!(second_cached.invocations(), 0);
    assert_eq!(second_uncached.invocations(), 2);
}

#[tokio::test]
async fn persisted_cache_survives_reload_but_not_config_changes() {
    let fx = ProjectFixture::new();
    fx.write("src/css/a.css", "a { color: red; }")
        .write("src/css/b.css", "b { color: blue; }");
    let file_cache = BUNDLE_CONFIG.replace("\"memory\"", "\"file\"");
    let config = fx.config(&file_cache);

    assert_eq!(Session::open(&config, false).build().await.invocations(), 2);
    assert!(fx.exists(".assetflow/cache"));
    assert_eq!(Session::open(&config, false).build().await.invocations(), 0);

    // A different separator changes the pipeline configuration hash.
    let changed = file_cache.replace(
        "file = \"styles.min.css\" }",
        "file = \"styles.min.css\", separator = \"\\n\\n\" }",
    );
    let config = fx.config(&changed);
    assert_eq!(Session::open(&config, false).build().await.invocations(), 2);
}

#[tokio::test]
async fn edited_and_added_files_are_reprocessed_per_file() {
    let fx = ProjectFixture::new();
    fx.write("src/img/a.png", [0u8, 1, 2])
        .write("src/img/icons/b.png", [3u8, 4]);
    let config = fx.config(
        r#"
        [asset.image]
        src = ["src/img/**/*.png"]
        dest = "dist/img"

        [task.images]
        asset = "image"
        "#,
    );
    let session = Session::open(&config, false);

    assert_eq!(session.build().await.invocations(), 2);
    assert_eq!(fx.read("dist/img/icons/b.png"), vec![3u8, 4]);

    fx.write("src/img/a.png", [9u8]);
    fx.write("src/img/c.png", [7u8]);
    let run = session.build().await;
    assert_eq!(run.invocations(), 2);
    assert_eq!(fx.read("dist/img/a.png"), vec![9u8]);

    // Removing an output forces its source back through the pipeline.
    fx.remove("dist/img/c.png");
    assert_eq!(session.build().await.invocations(), 1);
}

#[tokio::test]
async fn include_and_rename_stages() {
    let fx = ProjectFixture::new();
    fx.write("src/js/main.js", "//= partials/a.js\nmain();\n")
        .write("src/js/partials/a.js", "function a() {}\n");
    let config = fx.config(
        r#"
        [asset.script]
        src = ["src/js/main.js"]
        dest = "dist/js"

        [task.js]
        asset = "script"
        stages = [{ kind = "include" }, { kind = "rename", extension = "min.js" }]
        "#,
    );
    let session = Session::open(&config, false);
    let run = session.build_task("js").await;
    assert!(run.success());
    assert_eq!(
        String::from_utf8(fx.read("dist/js/main.min.js")).unwrap(),
        "function a() {}\nmain();\n"
    );
}

#[tokio::test]
async fn editing_a_partial_rebuilds_pages_like_an_uncached_run() {
    let fx = ProjectFixture::new();
    fx.write("src/index.html", "<body>\n//= template/footer.html\n</body>\n")
        .write("src/template/footer.html", "<footer>v1</footer>\n");
    let config = fx.config(
        r#"
        [config]
        cache = "file"

        [asset.html]
        src = ["src/*.html"]
        dest = "dist"

        [task.bundleHtml]
        asset = "html"
        stages = [{ kind = "include" }]
        watch = ["src/**/*.html"]
        "#,
    );

    assert_eq!(Session::open(&config, false).build().await.invocations(), 1);
    fx.write("src/template/footer.html", "<footer>v2</footer>\n");

    let cached = Session::open(&config, false).build().await;
    assert_eq!(cached.invocations(), 1);
    let with_cache = fx.snapshot("dist");

    Session::open(&config, true).build().await;
    assert_eq!(fx.snapshot("dist"), with_cache);
    assert_eq!(
        String::from_utf8(fx.read("dist/index.html")).unwrap(),
        "<body>\n<footer>v2</footer>\n</body>\n"
    );
}

#[tokio::test]
async fn resolver_order_puts_earlier_patterns_first() {
    let fx = ProjectFixture::new();
    fx.write("src/sass/a.scss", "a")
        .write("src/sass/core/vars.scss", "vars")
        .write("src/sass/z.scss", "z");
    let config = fx.config(
        r#"
        [asset.style]
        src = ["src/sass/core/*.scss", "src/sass/**/*.scss"]
        dest = "dist/css"

        [task.css]
        asset = "style"
        stages = [{ kind = "concat", file = "all.css", separator = "|" }]
        "#,
    );
    Session::open(&config, false).build().await;
    assert_eq!(fx.read("dist/css/all.css"), b"vars|a|z");
}

#[cfg(unix)]
#[tokio::test]
async fn command_stage_pipes_through_the_shell() {
    let fx = ProjectFixture::new();
    fx.write("src/css/a.css", "a{}");
    let config = fx.config(
        r#"
        [asset.style]
        src = ["src/css/*.css"]
        dest = "dist/css"

        [task.css]
        asset = "style"
        stages = [{ kind = "command", cmd = "tr a-z A-Z", input = "css", output = "css" }]
        "#,
    );
    let run = Session::open(&config, false).build().await;
    assert!(run.success());
    assert_eq!(fx.read("dist/css/a.css"), b"A{}");
}

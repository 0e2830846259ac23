// tests/build_pipeline.rs

use std::path::Path;

use assetdag::build_runner;
use assetdag::config::load_from_str;
use assetdag::errors::AssetdagError;
use assetdag_test_utils::project::TempProject;
use assetdag_test_utils::{init_tracing, with_timeout};

const SITE: &str = r#"
[paths]
js = ["client/app/**/*.module.js", "client/app/**/*.js", "!client/app/**/*.spec.js"]
css = ["client/content/**/*.css"]

[task.js]
[[task.js.step]]
kind = "concat"
src = ["@js"]
dest = "{stage}/all.js"

[task.css]
[[task.css.step]]
kind = "concat"
src = ["@css"]
dest = "{stage}/content/all.css"

[task.fonts]
[[task.fonts.step]]
kind = "copy"
src = ["vendor/fonts/**/*"]
dest = "{stage}/fonts"
base = "vendor/fonts"

[task.stage]
after = ["js", "css", "fonts"]
[[task.stage.step]]
kind = "inject"
target = "client/index.html"
dest = "{stage}"
ignore_path = "{stage}"
[[task.stage.step.blocks]]
src = ["{stage}/content/all.css", "{stage}/all.js"]
"#;

fn site() -> TempProject {
    let project = TempProject::new();
    project
        .write("client/app/avengers/avengers.js", "avengers();")
        .write("client/app/avengers/avengers.spec.js", "spec();")
        .write("client/app/app.module.js", "module();")
        .write("client/app/core/core.module.js", "core();")
        .write("client/content/styles.css", "body {}")
        .write("vendor/fonts/fa/fontawesome.woff", "font")
        .write(
            "client/index.html",
            "<html>\n  <head>\n    <!-- inject:css -->\n    <!-- endinject -->\n  </head>\n  <body>\n    <!-- inject:js -->\n    <!-- endinject -->\n  </body>\n</html>\n",
        );
    project
}

#[tokio::test]
async fn stage_builds_bundles_and_injects_them() {
    init_tracing();
    let site = site();
    let root = site.root();
    let cfg = load_from_str(SITE).unwrap();
    let runner = build_runner(&cfg, root).unwrap();

    let report = with_timeout(runner.run("stage")).await.unwrap();
    assert_eq!(report.completed.len(), 4);

    let bundle = site.read("build/stage/all.js");
    assert_eq!(bundle, "module();\ncore();\navengers();");

    assert!(site.path("build/stage/fonts/fa/fontawesome.woff").is_file());

    let index = site.read("build/stage/index.html");
    assert!(index.contains(r#"    <link rel="stylesheet" href="/content/all.css">"#));
    assert!(index.contains(r#"    <script src="/all.js"></script>"#));
    assert!(!index.contains("spec"));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_reports_the_task_and_blocks_dependents() {
    let site = site();
    let root = site.root();
    let cfg = load_from_str(
        r#"
[task.jshint]
[[task.jshint.step]]
kind = "command"
cmd = "echo \"client/app/app.module.js: line 1, Missing semicolon\" >&2; exit 2"
src = ["client/app/**/*.js"]

[task.js]
after = ["jshint"]
[[task.js.step]]
kind = "concat"
src = ["client/app/**/*.js"]
dest = "{stage}/all.js"
"#,
    )
    .unwrap();
    let runner = build_runner(&cfg, root).unwrap();

    let err = with_timeout(runner.run("js")).await.unwrap_err();

    let AssetdagError::TaskFailures(failures) = &err else {
        panic!("expected task failures, got {err:?}");
    };
    let failure = failures.iter().next().unwrap();
    assert_eq!(failure.task, "jshint");
    assert_eq!(failure.error.step, "command");
    assert!(failure.error.message.contains("Missing semicolon"));
    assert_eq!(
        failure.error.file.as_deref(),
        Some(Path::new("client/app/app.module.js"))
    );
    assert_eq!(err.exit_code(), 1);
    assert!(!site.exists("build/stage/all.js"));
}

#[cfg(unix)]
#[tokio::test]
async fn cached_command_skips_unchanged_inputs() {
    let site = site();
    let root = site.root();
    let cfg = load_from_str(
        r#"
[task.images]
[[task.images.step]]
kind = "command"
cmd = "echo run >> runs.log; mkdir -p {stage}; cat {inputs} > {output}"
src = ["client/content/**/*.css"]
output = "{stage}/out.css"
cache = true
"#,
    )
    .unwrap();
    let runner = build_runner(&cfg, root).unwrap();

    with_timeout(runner.run("images")).await.unwrap();
    with_timeout(runner.run("images")).await.unwrap();
    assert_eq!(site.read("runs.log").lines().count(), 1);

    site.write("client/content/styles.css", "body { margin: 0 }");
    with_timeout(runner.run("images")).await.unwrap();
    assert_eq!(site.read("runs.log").lines().count(), 2);
    assert_eq!(
        site.read("build/stage/out.css"),
        "body { margin: 0 }"
    );
}

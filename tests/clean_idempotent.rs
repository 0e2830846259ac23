// tests/clean_idempotent.rs

use assetdag::clean::clean;
use assetdag::fs::RealFileSystem;
use assetdag_test_utils::project::TempProject;

#[test]
fn clean_twice_removes_nothing_the_second_time() {
    let project = TempProject::new();
    project
        .write("build/stage/all.js", "js")
        .write("build/stage/content/all.css", "css")
        .write("client/index.html", "<html></html>");

    let first = clean(&RealFileSystem, project.root(), "build/stage").unwrap();
    assert_eq!(first.files_removed, 2);
    assert!(!project.exists("build/stage"));
    assert!(project.exists("build"));
    assert!(project.exists("client/index.html"));

    let second = clean(&RealFileSystem, project.root(), "build/stage").unwrap();
    assert_eq!(second.files_removed, 0);
}

// tests/watcher_events.rs

use std::time::Duration;

use tokio::sync::mpsc;
use assetdag::errors::AssetdagError;
use assetdag::paths::CompiledPathSet;
use assetdag::types::ChangeKind;
use assetdag::watch::{watch, ChangeBatch};
use assetdag_test_utils::{init_tracing, with_timeout};

fn set(patterns: &[&str]) -> CompiledPathSet {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    CompiledPathSet::compile("test", &patterns).unwrap()
}

#[tokio::test]
async fn changes_inside_the_set_are_reported_relative_to_root() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("client/content")).unwrap();

    let (tx, mut rx) = mpsc::channel::<ChangeBatch>(16);
    let _handle = watch(
        dir.path(),
        "css",
        set(&["client/**/*.css"]),
        Duration::from_millis(50),
        tx,
    )
    .unwrap();
    // Give the backend a moment to register.
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::write(dir.path().join("client/content/notes.txt"), "ignored").unwrap();
    std::fs::write(dir.path().join("client/content/app.css"), "body {}").unwrap();

    let batch = with_timeout(rx.recv()).await.unwrap();
    assert_eq!(batch.group, "css");
    assert!(batch
        .changes
        .iter()
        .all(|c| c.path.ends_with(".css")));
    let change = batch
        .changes
        .iter()
        .find(|c| c.path == "client/content/app.css")
        .expect("app.css change");
    assert!(matches!(change.kind, ChangeKind::Created | ChangeKind::Modified));
}

#[tokio::test]
async fn missing_base_directory_fails_only_this_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = mpsc::channel::<ChangeBatch>(1);

    let err = watch(
        dir.path(),
        "images",
        set(&["client/content/images/**/*"]),
        Duration::from_millis(50),
        tx,
    )
    .unwrap_err();

    assert!(matches!(err, AssetdagError::Watch { ref group, .. } if group == "images"));
    assert_eq!(err.exit_code(), 1);
}

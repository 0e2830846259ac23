// src/clean.rs

//! `clean`: remove the staging tree.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::errors::Result;
use crate::fs::{walk_files, FileSystem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub files_removed: usize,
}

/// Remove `stage` (relative to `root`) and everything below it.
///
/// A missing staging directory is not an error, so cleaning twice succeeds
/// and the second run removes nothing.
pub fn clean(fs: &dyn FileSystem, root: &Path, stage: &str) -> Result<CleanReport> {
    let dir = root.join(stage);
    info!(stage, "cleaning");

    if !fs.is_dir(&dir) {
        info!(stage, files_removed = 0, "nothing to clean");
        return Ok(CleanReport::default());
    }

    let files_removed = walk_files(fs, &dir)?.len();
    fs.remove_dir_all(&dir)
        .with_context(|| format!("cleaning {}", dir.display()))?;

    info!(stage, files_removed, "cleaned");
    Ok(CleanReport { files_removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn removes_every_file_below_stage() {
        let fs = MockFileSystem::new();
        fs.add_file("proj/build/stage/all.js", "js");
        fs.add_file("proj/build/stage/content/all.css", "css");
        fs.add_file("proj/client/index.html", "html");

        let report = clean(&fs, Path::new("proj"), "build/stage").unwrap();
        assert_eq!(report.files_removed, 2);
        assert!(!fs.exists(Path::new("proj/build/stage")));
        assert!(fs.exists(Path::new("proj/client/index.html")));
    }

    #[test]
    fn missing_stage_removes_nothing() {
        let fs = MockFileSystem::new();
        let report = clean(&fs, Path::new("proj"), "build/stage").unwrap();
        assert_eq!(report, CleanReport { files_removed: 0 });
    }
}

// src/watch/group.rs

use crate::engine::TaskName;
use crate::paths::CompiledPathSet;
use crate::types::ChangeKind;

/// A path set and the tasks it re-triggers when a matching file changes.
#[derive(Debug, Clone)]
pub struct WatchGroup {
    pub name: String,
    pub paths: CompiledPathSet,
    pub tasks: Vec<TaskName>,
}

/// One changed file, relative to the project root with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Lower-cased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

/// Changes seen by one watcher within one debounce window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub group: String,
    pub changes: Vec<FileChange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_ignores_directories_with_dots() {
        assert_eq!(FileChange::new("server/routes.v2/app.JS", ChangeKind::Modified).extension().as_deref(), Some("js"));
        assert_eq!(FileChange::new("client.d/Makefile", ChangeKind::Created).extension(), None);
    }
}

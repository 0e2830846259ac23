// src/watch/debounce.rs

use std::collections::HashMap;

use crate::types::ChangeKind;
use crate::watch::group::FileChange;

/// Collects the changes of one debounce window.
///
/// Each path is reported once, at the position of its first event, with the
/// kinds folded together:
/// - created then modified is still created;
/// - anything followed by a delete is deleted;
/// - deleted then created (editors that replace files) is modified.
#[derive(Debug, Default)]
pub struct ChangeBuffer {
    order: Vec<String>,
    kinds: HashMap<String, ChangeKind>,
}

impl ChangeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn push(&mut self, change: FileChange) {
        match self.kinds.get_mut(&change.path) {
            Some(kind) => *kind = fold(*kind, change.kind),
            None => {
                self.kinds.insert(change.path.clone(), change.kind);
                self.order.push(change.path);
            }
        }
    }

    /// Drain the window.
    pub fn take(&mut self) -> Vec<FileChange> {
        let mut kinds = std::mem::take(&mut self.kinds);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|path| kinds.remove(&path).map(|kind| FileChange { path, kind }))
            .collect()
    }
}

fn fold(previous: ChangeKind, next: ChangeKind) -> ChangeKind {
    use ChangeKind::*;
    match (previous, next) {
        (_, Deleted) => Deleted,
        (Deleted, Created) | (Deleted, Modified) => Modified,
        (Created, _) => Created,
        (Modified, _) => Modified,
    }
}

/// Incremental aggregation of a node's attributes into its ancestors.
///
/// Every file and every newly discovered folder produces one [`Delta`], which
/// is added to each ancestor on the way up to the root. Each step holds only
/// the lock of the ancestor being updated and releases it before resolving the
/// next parent, so two propagations racing up a shared ancestor can never
/// deadlock. Deltas are plain sums (and a max for timestamps), so the order in
/// which sibling subtrees report is irrelevant.
use crate::model::{FileTree, NodeIndex, NodeStats};
use std::time::SystemTime;

/// Change to add to every ancestor of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    pub size: u64,
    pub allocated: u64,
    pub files: u64,
    pub folders: u64,
    pub modified: Option<SystemTime>,
}

impl Delta {
    /// Contribution of a measured file.
    pub fn file(stats: &NodeStats) -> Self {
        Self {
            size: stats.size,
            allocated: stats.allocated,
            files: stats.file_count,
            folders: 0,
            modified: stats.modified,
        }
    }

    /// Contribution of a folder the moment it is discovered, before any of its
    /// contents are known.
    pub fn folder(modified: Option<SystemTime>) -> Self {
        Self {
            folders: 1,
            modified,
            ..Self::default()
        }
    }

    fn apply(&self, stats: &mut NodeStats) {
        stats.size += self.size;
        stats.allocated += self.allocated;
        stats.file_count += self.files;
        stats.folder_count += self.folders;
        stats.modified = latest(stats.modified, self.modified);
    }
}

/// Later of two optional timestamps.
pub(crate) fn latest(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Add `delta` to every ancestor of `node`, nearest first.
///
/// The node itself is not touched; its own attributes are written by the task
/// that created it.
pub fn propagate(tree: &FileTree, node: NodeIndex, delta: Delta) {
    let mut current = tree.get(node).parent;
    while let Some(idx) = current {
        let ancestor = tree.get(idx);
        {
            let mut state = ancestor.lock();
            delta.apply(&mut state.stats);
        }
        current = ancestor.parent;
    }
}

/// Largest flagged items.
///
/// Collects the nodes the metrics pass marked as large, most significant
/// first, for summaries that don't want to walk the tree themselves.
use crate::model::{BasisMetric, FileTree, NodeIndex, NodeKind};
use serde::Serialize;

/// A single entry in the "large items" results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LargeItem {
    /// Index into the file tree arena.
    pub index: NodeIndex,
    pub kind: NodeKind,
    /// Full path on disk.
    pub path: String,
    /// The node's metric under the basis it was ranked by.
    pub metric: u64,
}

/// The `n` largest flagged files and folders, excluding the root and the
/// per-directory file aggregates.
///
/// Only subtrees under large nodes can contain large nodes, so the search
/// stops descending at the first small node, like the flagging pass does.
pub fn large_items(tree: &FileTree, basis: BasisMetric, n: usize) -> Vec<LargeItem> {
    let Some(root) = tree.root() else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut stack = tree.children(root);
    while let Some(idx) = stack.pop() {
        let node = tree.get(idx);
        if !node.is_large() {
            continue;
        }
        if node.kind != NodeKind::FilesAggregate {
            found.push(LargeItem {
                index: idx,
                kind: node.kind,
                path: node.path.to_string_lossy().into_owned(),
                metric: node.stats().metric(basis),
            });
        }
        stack.extend(node.children());
    }

    found.sort_by(|a, b| b.metric.cmp(&a.metric).then_with(|| a.path.cmp(&b.path)));
    found.truncate(n);
    found
}

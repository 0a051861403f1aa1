/// Data model for the diskprobe file tree.
///
/// Re-exports the arena-allocated tree structure and supporting types.
pub mod file_node;
pub mod file_tree;
pub mod size;

pub use file_node::{
    BasisMetric, FileNode, NodeIndex, NodeKind, NodeSnapshot, NodeStats, MAX_PERCENT,
};
pub use file_tree::{FileTree, ROOT};

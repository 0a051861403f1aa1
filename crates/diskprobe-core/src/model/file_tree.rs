/// Arena-backed file tree shared between the scanner and its readers.
///
/// All nodes live in a single `Vec<Arc<FileNode>>`. Relationships between
/// nodes use `NodeIndex` (a thin `u32` wrapper) rather than pointers, so the
/// parent/root back-references never keep anything alive.
///
/// # Locking
///
/// The arena's `RwLock` only guards the vector itself: it is write-locked for
/// the duration of a single `push` and read-locked just long enough to clone
/// an `Arc`. Node attributes are guarded by each node's own mutex, so no lock
/// ever spans more than one node and scanner threads working on unrelated
/// subtrees never wait on each other.
use super::file_node::{BasisMetric, FileNode, NodeIndex, NodeKind, NodeSnapshot};
use crate::platform::VolumeInfo;
use compact_str::CompactString;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// The scan root always occupies the first arena slot.
pub const ROOT: NodeIndex = NodeIndex(0);

/// The tree produced by one scan.
#[derive(Debug, Default)]
pub struct FileTree {
    nodes: RwLock<Vec<Arc<FileNode>>>,

    /// Volume facts probed once for the scan root and shared by every node.
    volume: OnceLock<VolumeInfo>,

    /// Basis the percentages and large flags were last computed with.
    ranked_by: Mutex<Option<BasisMetric>>,
}

impl FileTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree with pre-allocated capacity.
    ///
    /// `estimated_nodes` should be a rough upper bound. The arena will grow
    /// if needed, but pre-allocation avoids repeated re-allocation while
    /// scanning.
    pub fn with_capacity(estimated_nodes: usize) -> Self {
        Self {
            nodes: RwLock::new(Vec::with_capacity(estimated_nodes)),
            volume: OnceLock::new(),
            ranked_by: Mutex::new(None),
        }
    }

    /// Insert the scan root. Its display name is the full path.
    ///
    /// Must be called exactly once, on an empty tree.
    pub fn add_root(&self, kind: NodeKind, path: PathBuf) -> NodeIndex {
        let name = CompactString::new(path.to_string_lossy());
        let mut nodes = self.nodes.write();
        debug_assert!(nodes.is_empty(), "scan root inserted twice");
        nodes.push(Arc::new(FileNode::new(kind, name, path, None, ROOT)));
        ROOT
    }

    /// Replace the root with a fresh node of `kind`, keeping its name and
    /// path. Only valid before anything has been attached to it.
    pub(crate) fn retype_root(&self, kind: NodeKind) {
        let mut nodes = self.nodes.write();
        debug_assert_eq!(nodes.len(), 1, "root retyped after children were added");
        let old = &nodes[ROOT.idx()];
        let root = FileNode::new(kind, old.name.clone(), old.path.clone(), None, ROOT);
        nodes[ROOT.idx()] = Arc::new(root);
    }

    /// Allocate a node and attach it as the newest child of `parent`.
    pub fn add_child(
        &self,
        parent: NodeIndex,
        kind: NodeKind,
        name: CompactString,
        path: PathBuf,
    ) -> NodeIndex {
        let parent_node = self.get(parent);
        let node = FileNode::new(kind, name, path, Some(parent), parent_node.root);
        let idx = {
            let mut nodes = self.nodes.write();
            let idx = NodeIndex::new(nodes.len());
            nodes.push(Arc::new(node));
            idx
        };
        parent_node.lock().children.push(idx);
        idx
    }

    /// Get the node at the given index.
    ///
    /// Panics if `index` was not produced by this tree.
    #[inline]
    pub fn get(&self, index: NodeIndex) -> Arc<FileNode> {
        Arc::clone(&self.nodes.read()[index.idx()])
    }

    /// The scan root, once the scanner has created it.
    pub fn root(&self) -> Option<NodeIndex> {
        if self.is_empty() {
            None
        } else {
            Some(ROOT)
        }
    }

    /// Direct children of a node (insertion order).
    pub fn children(&self, parent: NodeIndex) -> Vec<NodeIndex> {
        self.get(parent).children()
    }

    /// Direct children ordered by `basis` descending. Ties keep insertion order.
    pub fn children_sorted_by(&self, parent: NodeIndex, basis: BasisMetric) -> Vec<NodeIndex> {
        let mut keyed: Vec<(u64, NodeIndex)> = self
            .children(parent)
            .into_iter()
            .map(|idx| (self.get(idx).stats().metric(basis), idx))
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        keyed.into_iter().map(|(_, idx)| idx).collect()
    }

    /// Whether a node has children, derived from its counts without any I/O.
    pub fn has_children(&self, index: NodeIndex) -> bool {
        self.get(index).has_children()
    }

    /// Read-only copy of a node's attributes.
    pub fn snapshot(&self, index: NodeIndex) -> NodeSnapshot {
        self.get(index).snapshot(index)
    }

    /// Volume facts for the scan root, once probed.
    pub fn volume(&self) -> Option<&VolumeInfo> {
        self.volume.get()
    }

    /// Publish the probed volume facts. Later calls keep the first value.
    pub(crate) fn set_volume(&self, info: VolumeInfo) -> &VolumeInfo {
        self.volume.get_or_init(|| info)
    }

    /// Basis of the last metrics pass, `None` until one has run.
    pub fn ranked_by(&self) -> Option<BasisMetric> {
        *self.ranked_by.lock()
    }

    pub(crate) fn set_ranked_by(&self, basis: BasisMetric) {
        *self.ranked_by.lock() = Some(basis);
    }

    /// Cluster size of the scanned volume, or 0 before the probe ran.
    #[inline]
    pub fn cluster_size(&self) -> u64 {
        self.volume.get().map_or(0, |v| v.cluster_size)
    }

    /// Total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns `true` if the tree contains no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

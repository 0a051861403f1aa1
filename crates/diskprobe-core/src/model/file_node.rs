/// A single node in the arena-allocated file tree.
///
/// Nodes live in the tree's arena behind an `Arc` and reference each other
/// through `NodeIndex` values. Ownership runs one way only: a node's
/// `children` list is the owning edge, while `parent` and `root` are plain
/// indices used for traversal and lock acquisition.
///
/// Immutable identity (kind, name, path, links) sits directly on the node.
/// Everything the scan mutates afterwards sits behind the node's own
/// `parking_lot::Mutex`, which is the per-node lock the propagator takes.
use compact_str::{format_compact, CompactString};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Fixed-point value representing 100.0 % (unit = 0.1 %).
pub const MAX_PERCENT: u16 = 1000;

/// Lightweight index into the tree arena.
///
/// Uses `u32` to keep nodes small — supports up to ~4 billion nodes,
/// which is more than enough for any real filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`, panicking if it exceeds `u32::MAX`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// What a node represents on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A directory with no parent directory (volume root).
    Drive,
    Folder,
    File,
    /// Synthetic node collapsing every direct file of a folder into one entry.
    FilesAggregate,
}

impl NodeKind {
    /// `true` for kinds whose attributes are sums over children.
    #[inline]
    pub fn is_container(self) -> bool {
        !matches!(self, Self::File)
    }

    /// Short label for listings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::Folder => "folder",
            Self::File => "file",
            Self::FilesAggregate => "files",
        }
    }
}

/// The attribute used as denominator for percent-of-parent and as the
/// threshold for large-item detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasisMetric {
    #[default]
    Size,
    Allocated,
    Files,
}

impl BasisMetric {
    pub fn label(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Allocated => "allocated",
            Self::Files => "files",
        }
    }
}

/// Size and count attributes of a node.
///
/// For files these are intrinsic; for every container they are running sums
/// fed by the propagator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Logical size in bytes.
    pub size: u64,
    /// On-disk bytes, rounded to the volume's cluster size.
    pub allocated: u64,
    pub file_count: u64,
    pub folder_count: u64,
    /// Latest modification time of the node or anything beneath it.
    pub modified: Option<SystemTime>,
}

impl NodeStats {
    /// Intrinsic attributes of a single file.
    pub fn file(size: u64, allocated: u64, modified: Option<SystemTime>) -> Self {
        Self {
            size,
            allocated,
            file_count: 1,
            folder_count: 0,
            modified,
        }
    }

    /// Value of the chosen basis metric.
    #[inline]
    pub fn metric(&self, basis: BasisMetric) -> u64 {
        match basis {
            BasisMetric::Size => self.size,
            BasisMetric::Allocated => self.allocated,
            BasisMetric::Files => self.file_count,
        }
    }
}

/// Mutable part of a node, guarded by the node's lock.
#[derive(Debug, Default)]
pub(crate) struct NodeState {
    pub(crate) stats: NodeStats,
    /// Owned children, in insertion order.
    pub(crate) children: Vec<NodeIndex>,
    /// Share of the parent's basis metric, 0–1000.
    pub(crate) percent_of_parent: u16,
    pub(crate) is_large: bool,
    /// `true` if this entry could not be read (access denied, vanished).
    pub(crate) is_error: bool,
}

/// A single file, folder, drive, or files-aggregate in the tree.
#[derive(Debug)]
pub struct FileNode {
    pub kind: NodeKind,

    /// Entry name; the full path for the scan root. Aggregates store an empty
    /// name and build their label from the current file count.
    pub name: CompactString,

    /// Absolute path. A files-aggregate carries its owning folder's path.
    pub path: PathBuf,

    /// Index of the parent node. `None` only for the scan root.
    pub parent: Option<NodeIndex>,

    /// Index of the scan root. Set once at creation.
    pub root: NodeIndex,

    state: Mutex<NodeState>,
}

impl FileNode {
    /// Create a node with placeholder (zero) attributes.
    pub fn new(
        kind: NodeKind,
        name: CompactString,
        path: PathBuf,
        parent: Option<NodeIndex>,
        root: NodeIndex,
    ) -> Self {
        Self {
            kind,
            name,
            path,
            parent,
            root,
            state: Mutex::new(NodeState::default()),
        }
    }

    /// Acquire this node's lock.
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock()
    }

    /// Copy of the current attributes.
    pub fn stats(&self) -> NodeStats {
        self.state.lock().stats
    }

    /// Direct children, in insertion order.
    pub fn children(&self) -> Vec<NodeIndex> {
        self.state.lock().children.clone()
    }

    pub fn percent_of_parent(&self) -> u16 {
        self.state.lock().percent_of_parent
    }

    pub fn is_large(&self) -> bool {
        self.state.lock().is_large
    }

    pub fn is_error(&self) -> bool {
        self.state.lock().is_error
    }

    /// Whether the node has children, answered from the known counts alone.
    ///
    /// Never touches the disk, so a front end can call it while rendering.
    pub fn has_children(&self) -> bool {
        let stats = self.stats();
        match self.kind {
            NodeKind::File => false,
            NodeKind::FilesAggregate => stats.file_count > 0,
            NodeKind::Drive | NodeKind::Folder => stats.file_count + stats.folder_count > 0,
        }
    }

    /// Name shown to the user. Aggregates are labelled with their file count.
    pub fn display_name(&self) -> CompactString {
        match self.kind {
            NodeKind::FilesAggregate => files_label(self.stats().file_count),
            _ => self.name.clone(),
        }
    }

    /// Consistent copy of every attribute, taken under one lock acquisition.
    pub fn snapshot(&self, index: NodeIndex) -> NodeSnapshot {
        let state = self.state.lock();
        let name = match self.kind {
            NodeKind::FilesAggregate => files_label(state.stats.file_count),
            _ => self.name.clone(),
        };
        NodeSnapshot {
            index,
            kind: self.kind,
            name,
            path: self.path.clone(),
            size: state.stats.size,
            allocated: state.stats.allocated,
            file_count: state.stats.file_count,
            folder_count: state.stats.folder_count,
            modified: state.stats.modified,
            percent_of_parent: state.percent_of_parent,
            is_large: state.is_large,
            is_error: state.is_error,
            child_count: state.children.len(),
        }
    }
}

fn files_label(count: u64) -> CompactString {
    if count == 1 {
        CompactString::new("[1 file]")
    } else {
        format_compact!("[{count} files]")
    }
}

/// Read-only copy of a node, suitable for rendering or serialisation.
#[derive(Clone, Debug, Serialize)]
pub struct NodeSnapshot {
    pub index: NodeIndex,
    pub kind: NodeKind,
    pub name: CompactString,
    pub path: PathBuf,
    pub size: u64,
    pub allocated: u64,
    pub file_count: u64,
    pub folder_count: u64,
    pub modified: Option<SystemTime>,
    pub percent_of_parent: u16,
    pub is_large: bool,
    pub is_error: bool,
    pub child_count: usize,
}

impl NodeSnapshot {
    /// Value of the chosen basis metric.
    pub fn metric(&self, basis: BasisMetric) -> u64 {
        match basis {
            BasisMetric::Size => self.size,
            BasisMetric::Allocated => self.allocated,
            BasisMetric::Files => self.file_count,
        }
    }
}

/// Parallel directory walker.
///
/// The whole walk runs inside one `rayon::scope`. Every directory is a task
/// spawned into that scope: it lists its directory, creates child nodes the
/// moment they are discovered, spawns one task per subdirectory and measures
/// its files in batches spawned alongside. Tasks never wait on each other, so
/// stack depth stays flat however deep the tree goes; the scope only returns
/// once every spawned task has, at which point the whole tree is settled.
///
/// Cancellation is observed before every filesystem call and before each
/// attribute write. A task that observes it records the fact and returns
/// without spawning anything further; tasks already queued return on their
/// first check. Nodes already in the tree are left as they are.
///
/// Aggregation is incremental (see [`propagate`](super::propagate)): a file's
/// contribution climbs to the root as soon as it is measured, so readers see
/// sizes grow while the scan is still running.
use super::progress::ScanProgress;
use super::propagate::{propagate, Delta};
use super::{CancelFlag, Cancelled};
use crate::model::{FileTree, NodeIndex, NodeKind, NodeStats};
use crate::platform::{allocated_bytes, DirListing, FsProvider};
use compact_str::CompactString;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rayon::Scope;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Send a progress update roughly every this many measured entries.
const UPDATE_INTERVAL: u64 = 1_000;

/// Files measured per spawned task.
const FILE_BATCH: usize = 256;

/// Running totals shared by every worker.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub files: AtomicU64,
    pub dirs: AtomicU64,
    pub bytes: AtomicU64,
    pub errors: AtomicU64,
}

/// State shared by all tasks of one scan.
pub(crate) struct Walker<'a> {
    tree: &'a FileTree,
    fs: &'a dyn FsProvider,
    cancel: &'a CancelFlag,
    progress_tx: &'a Sender<ScanProgress>,
    follow_symlinks: bool,
    /// Canonical directories already entered. Only populated when following
    /// links, since without links a directory cannot be reached twice.
    visited: Mutex<HashSet<PathBuf>>,
    /// Set by the first task that observes cancellation.
    stopped: AtomicBool,
    pub(crate) counters: Counters,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(
        tree: &'a FileTree,
        fs: &'a dyn FsProvider,
        cancel: &'a CancelFlag,
        progress_tx: &'a Sender<ScanProgress>,
        follow_symlinks: bool,
    ) -> Self {
        Self {
            tree,
            fs,
            cancel,
            progress_tx,
            follow_symlinks,
            visited: Mutex::new(HashSet::new()),
            stopped: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Record the scan root as entered, for link-cycle detection.
    pub(crate) fn mark_root_visited(&self, root: &Path) {
        if self.follow_symlinks {
            if let Ok(canonical) = self.fs.canonicalize(root) {
                self.visited.lock().insert(canonical);
            }
        }
    }

    /// Walk an already-listed root directory. Returns once every
    /// descendant has been measured, or `Err(Cancelled)` if any task stopped
    /// early.
    pub(crate) fn walk(
        &self,
        root: NodeIndex,
        path: &Path,
        listing: DirListing,
    ) -> Result<(), Cancelled> {
        rayon::scope(|scope| self.run_task(|| self.expand(scope, root, path, listing)));
        if self.stopped.load(Ordering::Relaxed) {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    fn run_task(&self, task: impl FnOnce() -> Result<(), Cancelled>) {
        if task().is_err() {
            self.stopped.store(true, Ordering::Relaxed);
        }
    }

    /// List `path` and expand its contents under `dir`.
    fn visit_dir<'s>(
        &'s self,
        scope: &Scope<'s>,
        dir: NodeIndex,
        path: &Path,
    ) -> Result<(), Cancelled> {
        self.cancel.check()?;
        let listing = match self.fs.list(path) {
            Ok(listing) => listing,
            Err(err) => {
                // A listing interrupted by cancellation is not an access error.
                self.cancel.check()?;
                self.record_error(dir, path, &err);
                return Ok(());
            }
        };
        self.expand(scope, dir, path, listing)
    }

    /// Create nodes for a listed directory and spawn tasks for its contents.
    fn expand<'s>(
        &'s self,
        scope: &Scope<'s>,
        dir: NodeIndex,
        path: &Path,
        listing: DirListing,
    ) -> Result<(), Cancelled> {
        self.cancel.check()?;
        let DirListing { dirs, files } = listing;

        // All loose files of a directory hang under a single aggregate node.
        if !files.is_empty() {
            let agg = self.tree.add_child(
                dir,
                NodeKind::FilesAggregate,
                CompactString::default(),
                path.to_path_buf(),
            );
            for batch in files.chunks(FILE_BATCH) {
                let batch = batch.to_vec();
                scope.spawn(move |_| {
                    self.run_task(|| {
                        batch
                            .iter()
                            .try_for_each(|file| self.measure_file(agg, file))
                    })
                });
            }
        }

        for child in dirs {
            self.cancel.check()?;
            if let Some((idx, child)) = self.discover_dir(dir, child) {
                scope.spawn(move |scope| self.run_task(|| self.enter_dir(scope, idx, &child)));
            }
        }
        Ok(())
    }

    /// Create the node for a newly discovered subdirectory and count it in
    /// every ancestor straight away, before any of its contents are known.
    fn discover_dir(&self, parent: NodeIndex, path: PathBuf) -> Option<(NodeIndex, PathBuf)> {
        if self.follow_symlinks && !self.first_visit(&path) {
            debug!(path = %path.display(), "skipping already visited directory");
            return None;
        }
        let idx = self
            .tree
            .add_child(parent, NodeKind::Folder, entry_name(&path), path.clone());
        propagate(self.tree, idx, Delta::folder(None));
        self.counters.dirs.fetch_add(1, Ordering::Relaxed);
        Some((idx, path))
    }

    /// `false` if the canonical target of `path` was entered before.
    fn first_visit(&self, path: &Path) -> bool {
        match self.fs.canonicalize(path) {
            Ok(canonical) => self.visited.lock().insert(canonical),
            // Unresolvable links are still descended into; listing them will
            // fail and mark the node as an error.
            Err(_) => true,
        }
    }

    /// Stamp the folder's own timestamp, then walk it.
    fn enter_dir<'s>(
        &'s self,
        scope: &Scope<'s>,
        idx: NodeIndex,
        path: &Path,
    ) -> Result<(), Cancelled> {
        self.cancel.check()?;
        if let Ok(meta) = self.fs.stat(path, self.follow_symlinks) {
            if meta.modified.is_some() {
                self.cancel.check()?;
                self.tree.get(idx).lock().stats.modified = meta.modified;
                propagate(
                    self.tree,
                    idx,
                    Delta {
                        modified: meta.modified,
                        ..Delta::default()
                    },
                );
            }
        }
        self.visit_dir(scope, idx, path)
    }

    /// Create a file node, measure it and push its contribution upwards.
    ///
    /// A file that cannot be measured stays in the tree as a zero-byte error
    /// node that still counts as one file.
    fn measure_file(&self, parent: NodeIndex, path: &Path) -> Result<(), Cancelled> {
        self.cancel.check()?;
        let idx = self
            .tree
            .add_child(parent, NodeKind::File, entry_name(path), path.to_path_buf());

        let stats = match self.fs.stat(path, false) {
            Ok(meta) => {
                let allocated =
                    allocated_bytes(meta.len, meta.physical_len, self.tree.cluster_size());
                NodeStats::file(meta.len, allocated, meta.modified)
            }
            Err(err) => {
                self.cancel.check()?;
                self.record_error(idx, path, &err);
                NodeStats::file(0, 0, None)
            }
        };

        self.cancel.check()?;
        self.tree.get(idx).lock().stats = stats;
        propagate(self.tree, idx, Delta::file(&stats));
        self.tick(path, stats.size);
        Ok(())
    }

    fn record_error(&self, idx: NodeIndex, path: &Path, err: &io::Error) {
        self.tree.get(idx).lock().is_error = true;
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        warn!(path = %path.display(), "{err}");
        // Lossy: a slow consumer must never stall the workers.
        let _ = self.progress_tx.try_send(ScanProgress::Error {
            path: path.to_string_lossy().into_owned(),
            message: err.to_string(),
        });
    }

    fn tick(&self, path: &Path, size: u64) {
        self.counters.bytes.fetch_add(size, Ordering::Relaxed);
        let files = self.counters.files.fetch_add(1, Ordering::Relaxed) + 1;
        if files % UPDATE_INTERVAL == 0 {
            let _ = self.progress_tx.try_send(ScanProgress::Update {
                nodes: self.tree.len() as u64,
                files_found: files,
                dirs_found: self.counters.dirs.load(Ordering::Relaxed),
                total_size: self.counters.bytes.load(Ordering::Relaxed),
                current_path: path.to_string_lossy().into_owned(),
            });
        }
    }
}

/// Final path component, or the whole path when there is none.
pub(crate) fn entry_name(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => CompactString::new(path.to_string_lossy()),
    }
}

/// Scanner module — orchestrates a disk-usage scan.
///
/// A scan runs on its own named thread, which builds a dedicated rayon pool
/// and drives the [`parallel`] walker on it. The shared [`FileTree`] is
/// populated and aggregated incrementally, so readers can render it while the
/// scan is running; lightweight counters arrive on the progress channel.
///
/// When the walk settles, percentages and large-item flags are computed for
/// the configured basis before the scan reports completion.
pub mod parallel;
pub mod progress;
pub mod propagate;

use crate::analysis::metrics;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::model::{FileTree, NodeKind, NodeStats, ROOT};
use crate::platform::{allocated_bytes, FsProvider, OsFs, VolumeInfo};
use parallel::Walker;
use progress::ScanProgress;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Maximum number of progress messages that may queue up in the channel.
///
/// Workers never block on this channel: once it is full further `Update` and
/// `Error` messages are dropped until the consumer catches up.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Stack size for scan workers. Tasks are spawned rather than nested, so this
/// does not need to grow with tree depth.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Shared cancellation flag for one scan.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the scan to stop as soon as possible.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    #[inline]
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Marker returned by every step of a walk that observed cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancelled;

/// Lifecycle of a scan as observed from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ScanState {
    Created,
    Scanning,
    Completed,
    Cancelled,
    Failed,
}

/// How a scan ended.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Every node is settled and percentages are computed.
    Completed,
    /// Stopped on request. The tree holds whatever was measured so far.
    Cancelled,
    /// A root-level error aborted the scan.
    Failed(ScanError),
}

impl ScanOutcome {
    pub fn state(&self) -> ScanState {
        match self {
            Self::Completed => ScanState::Completed,
            Self::Cancelled => ScanState::Cancelled,
            Self::Failed(_) => ScanState::Failed,
        }
    }
}

/// Point-in-time summary of a scan.
#[derive(Clone, Debug, Serialize)]
pub struct ScanStatus {
    pub state: ScanState,
    pub root_path: PathBuf,
    pub nodes: usize,
    /// Files measured, including the root when it is a file.
    pub file_count: u64,
    /// Total logical size measured so far.
    pub total_size: u64,
    pub volume: Option<VolumeInfo>,
}

/// Handle to a running or completed scan. Allows cancellation and
/// receiving progress updates.
pub struct ScanHandle {
    /// Receiver for progress updates from the scan thread.
    pub progress_rx: Receiver<ScanProgress>,
    /// Shared tree that is populated incrementally during scanning.
    pub tree: Arc<FileTree>,
    root_path: PathBuf,
    cancel: CancelFlag,
    state: Arc<Mutex<ScanState>>,
    thread: Option<thread::JoinHandle<ScanOutcome>>,
}

impl ScanHandle {
    /// Request the scan to stop as soon as possible. Idempotent; has no
    /// effect once the scan has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `true` once the scan thread has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock()
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn status(&self) -> ScanStatus {
        let (file_count, total_size) = match self.tree.root() {
            Some(root) => {
                let stats = self.tree.get(root).stats();
                (stats.file_count, stats.size)
            }
            None => (0, 0),
        };
        ScanStatus {
            state: self.state(),
            root_path: self.root_path.clone(),
            nodes: self.tree.len(),
            file_count,
            total_size,
            volume: self.tree.volume().copied(),
        }
    }

    /// Block until the scan ends and return how it ended.
    ///
    /// This is the authoritative result; the terminal progress message may
    /// have been dropped if the channel was full.
    pub fn wait(mut self) -> ScanOutcome {
        let Some(thread) = self.thread.take() else {
            return ScanOutcome::Failed(ScanError::Panicked);
        };
        match thread.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                *self.state.lock() = ScanState::Failed;
                ScanOutcome::Failed(ScanError::Panicked)
            }
        }
    }
}

impl Drop for ScanHandle {
    /// A handle dropped mid-scan stops its scan instead of leaving it running
    /// unobserved.
    fn drop(&mut self) {
        if !self.is_finished() {
            self.cancel();
        }
    }
}

/// Start a new scan of `root_path` on the real filesystem.
///
/// Returns immediately with a `ScanHandle` for receiving progress, reading
/// the live tree and requesting cancellation.
pub fn start_scan(root_path: impl Into<PathBuf>, config: ScanConfig) -> ScanHandle {
    let fs = Arc::new(OsFs::new(config.follow_symlinks));
    start_scan_with(absolute(root_path.into()), config, fs)
}

/// Start a new scan using a custom filesystem provider.
///
/// `root_path` is passed to the provider exactly as given.
pub fn start_scan_with(
    root_path: impl Into<PathBuf>,
    config: ScanConfig,
    fs: Arc<dyn FsProvider>,
) -> ScanHandle {
    let root_path = root_path.into();
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel = CancelFlag::new();
    let state = Arc::new(Mutex::new(ScanState::Created));
    let tree = Arc::new(FileTree::with_capacity(4_096));
    // The root exists from the moment the scan does; its kind is settled once
    // the path has been stat'ed.
    tree.add_root(provisional_kind(&root_path), root_path.clone());

    let job = ScanJob {
        root_path: root_path.clone(),
        config,
        fs,
        tree: Arc::clone(&tree),
        cancel: cancel.clone(),
        state: Arc::clone(&state),
        progress_tx,
    };

    let thread = thread::Builder::new()
        .name("diskprobe-scanner".into())
        .spawn(move || job.run())
        .expect("failed to spawn scanner thread");

    ScanHandle {
        progress_rx,
        tree,
        root_path,
        cancel,
        state,
        thread: Some(thread),
    }
}

/// Everything the scan thread owns.
struct ScanJob {
    root_path: PathBuf,
    config: ScanConfig,
    fs: Arc<dyn FsProvider>,
    tree: Arc<FileTree>,
    cancel: CancelFlag,
    state: Arc<Mutex<ScanState>>,
    progress_tx: Sender<ScanProgress>,
}

impl ScanJob {
    fn run(self) -> ScanOutcome {
        let start = Instant::now();
        info!(path = %self.root_path.display(), "starting scan");
        *self.state.lock() = ScanState::Scanning;

        // The state is settled before the terminal message goes out, so a
        // consumer reacting to that message sees the final state.
        match self.walk() {
            Ok(Ok(error_count)) => {
                metrics::recompute(&self.tree, self.config.basis);
                let duration = start.elapsed();
                info!(
                    nodes = self.tree.len(),
                    errors = error_count,
                    "scan complete in {duration:?}"
                );
                *self.state.lock() = ScanState::Completed;
                let _ = self.progress_tx.try_send(ScanProgress::Complete {
                    duration,
                    error_count,
                });
                ScanOutcome::Completed
            }
            Ok(Err(Cancelled)) => {
                info!(nodes = self.tree.len(), "scan cancelled");
                *self.state.lock() = ScanState::Cancelled;
                let _ = self.progress_tx.try_send(ScanProgress::Cancelled);
                ScanOutcome::Cancelled
            }
            Err(err) => {
                warn!(path = %self.root_path.display(), "scan failed: {err}");
                *self.state.lock() = ScanState::Failed;
                let _ = self.progress_tx.try_send(ScanProgress::Failed {
                    message: err.to_string(),
                });
                ScanOutcome::Failed(err)
            }
        }
    }

    /// Classify the root, probe its volume and walk it.
    ///
    /// The outer `Result` carries root-level failures; the inner one carries
    /// cancellation, or the number of recovered per-entry errors.
    fn walk(&self) -> Result<Result<u64, Cancelled>, ScanError> {
        if self.cancel.check().is_err() {
            return Ok(Err(Cancelled));
        }
        let path = self.root_path.as_path();

        let meta = self
            .fs
            .stat(path, true)
            .map_err(|err| self.root_failed(ScanError::root(path, err)))?;
        let kind = if meta.is_dir {
            provisional_kind(path)
        } else {
            self.tree.retype_root(NodeKind::File);
            NodeKind::File
        };

        let volume = self.fs.volume(path).map_err(|source| {
            self.root_failed(ScanError::VolumeQuery {
                path: path.to_path_buf(),
                source,
            })
        })?;
        let volume = *self.tree.set_volume(volume);
        debug!(
            cluster_size = volume.cluster_size,
            free = volume.free_bytes,
            total = volume.total_bytes,
            "volume probed"
        );
        let _ = self.progress_tx.try_send(ScanProgress::Started { volume });

        if kind == NodeKind::File {
            let allocated = allocated_bytes(meta.len, meta.physical_len, volume.cluster_size);
            self.tree.get(ROOT).lock().stats = NodeStats::file(meta.len, allocated, meta.modified);
            return Ok(Ok(0));
        }
        self.tree.get(ROOT).lock().stats.modified = meta.modified;

        // Unlike every other directory, an unreadable root aborts the scan.
        let listing = self
            .fs
            .list(path)
            .map_err(|err| self.root_failed(ScanError::root(path, err)))?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads())
            .thread_name(|i| format!("diskprobe-worker-{i}"))
            .stack_size(WORKER_STACK_SIZE)
            .build()?;

        let walker = Walker::new(
            &self.tree,
            self.fs.as_ref(),
            &self.cancel,
            &self.progress_tx,
            self.config.follow_symlinks,
        );
        walker.mark_root_visited(path);

        let result = pool.install(|| walker.walk(ROOT, path, listing));
        Ok(result.map(|()| walker.counters.errors.load(Ordering::Relaxed)))
    }

    /// Mark the root as unreadable and pass the error through.
    fn root_failed(&self, err: ScanError) -> ScanError {
        self.tree.get(ROOT).lock().is_error = true;
        err
    }
}

/// Kind a directory root gets: a drive when it has no parent directory.
fn provisional_kind(path: &Path) -> NodeKind {
    match path.parent() {
        None => NodeKind::Drive,
        Some(_) => NodeKind::Folder,
    }
}

/// Resolve a relative root against the current directory. The path is not
/// canonicalized, so it is displayed the way the caller spelled it.
fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}

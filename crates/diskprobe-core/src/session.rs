/// Long-lived owner of the current scan.
///
/// A session holds at most one scan at a time. Starting a new scan (or
/// refreshing the current one) cancels and discards whatever was running, so
/// readers only ever see the tree of the latest scan. The basis metric lives
/// here too: changing it re-ranks the settled tree without rescanning. A
/// change made mid-scan is applied the first time the session observes the
/// scan has finished, whichever accessor observes it.
use crate::analysis::{large_items, metrics, LargeItem};
use crate::config::ScanConfig;
use crate::model::{BasisMetric, FileTree};
use crate::platform::{FsProvider, OsFs};
use crate::scanner::progress::ScanProgress;
use crate::scanner::{start_scan_with, ScanHandle, ScanOutcome, ScanState, ScanStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ScanSession {
    config: ScanConfig,
    fs: Arc<dyn FsProvider>,
    handle: Option<ScanHandle>,
    tree: Arc<FileTree>,
    root_path: Option<PathBuf>,
    /// Final state once the current scan has been waited on.
    finished: Option<ScanState>,
}

impl ScanSession {
    /// A session scanning the real filesystem.
    pub fn new(config: ScanConfig) -> Self {
        let fs = Arc::new(OsFs::new(config.follow_symlinks));
        Self::with_provider(config, fs)
    }

    /// A session scanning through a custom provider.
    pub fn with_provider(config: ScanConfig, fs: Arc<dyn FsProvider>) -> Self {
        Self {
            config,
            fs,
            handle: None,
            tree: Arc::new(FileTree::new()),
            root_path: None,
            finished: None,
        }
    }

    /// Start scanning `path`, abandoning any scan in progress.
    pub fn start_scan(&mut self, path: impl Into<PathBuf>) {
        self.discard_current();

        let handle = start_scan_with(path, self.config, Arc::clone(&self.fs));
        info!(path = %handle.root_path().display(), "session scan started");
        self.tree = Arc::clone(&handle.tree);
        self.root_path = Some(handle.root_path().to_path_buf());
        self.finished = None;
        self.handle = Some(handle);
    }

    /// Rescan the last scanned root. Returns `false` if nothing was scanned
    /// yet.
    pub fn refresh(&mut self) -> bool {
        match self.root_path.clone() {
            Some(path) => {
                self.start_scan(path);
                true
            }
            None => false,
        }
    }

    /// Request the current scan to stop. No effect when nothing is running.
    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.cancel();
        }
    }

    /// Drain pending progress messages without blocking.
    pub fn poll(&self) -> Vec<ScanProgress> {
        let messages = match &self.handle {
            Some(handle) => handle.progress_rx.try_iter().collect(),
            None => Vec::new(),
        };
        self.sync_basis();
        messages
    }

    /// Block until the current scan ends. `None` if there is no scan to wait
    /// for (never started, or already waited on).
    pub fn wait(&mut self) -> Option<ScanOutcome> {
        let handle = self.handle.take()?;
        let outcome = handle.wait();
        self.finished = Some(outcome.state());
        self.sync_basis();
        Some(outcome)
    }

    /// Change the metric percentages and large flags are based on.
    ///
    /// A settled tree is re-ranked straight away. A running scan is re-ranked
    /// as soon as the session sees it finish.
    pub fn set_basis_metric(&mut self, basis: BasisMetric) {
        self.config.basis = basis;
        self.sync_basis();
    }

    pub fn basis(&self) -> BasisMetric {
        self.config.basis
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The tree of the latest scan. Empty before the first scan.
    pub fn tree(&self) -> Arc<FileTree> {
        self.sync_basis();
        Arc::clone(&self.tree)
    }

    /// The `n` largest flagged items of the latest tree under the current
    /// basis.
    pub fn large_items(&self, n: usize) -> Vec<LargeItem> {
        self.sync_basis();
        large_items(&self.tree, self.config.basis, n)
    }

    pub fn root_path(&self) -> Option<&Path> {
        self.root_path.as_deref()
    }

    /// `true` while the current scan's thread is still running.
    pub fn is_scanning(&self) -> bool {
        let running = self.running();
        if !running {
            self.sync_basis();
        }
        running
    }

    /// Summary of the latest scan, if any was started.
    pub fn status(&self) -> Option<ScanStatus> {
        self.sync_basis();
        if let Some(handle) = &self.handle {
            return Some(handle.status());
        }
        let root_path = self.root_path.clone()?;
        let root = self.tree.root().map(|r| self.tree.get(r).stats());
        Some(ScanStatus {
            state: self.finished.unwrap_or(ScanState::Created),
            root_path,
            nodes: self.tree.len(),
            file_count: root.map_or(0, |s| s.file_count),
            total_size: root.map_or(0, |s| s.size),
            volume: self.tree.volume().copied(),
        })
    }

    fn running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Re-rank a finished tree whose last metrics pass used another basis.
    /// Trees that were never ranked (cancelled or failed scans) are left
    /// alone.
    fn sync_basis(&self) {
        if self.running() {
            return;
        }
        let basis = self.config.basis;
        if matches!(self.tree.ranked_by(), Some(ranked) if ranked != basis) {
            debug!(basis = basis.label(), "re-ranking tree");
            metrics::recompute(&self.tree, basis);
        }
    }

    /// Cancel the running scan and let its thread wind down on its own.
    fn discard_current(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                debug!(path = %handle.root_path().display(), "abandoning previous scan");
            }
            handle.cancel();
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.discard_current();
    }
}

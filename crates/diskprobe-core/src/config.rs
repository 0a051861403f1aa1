/// Scan configuration.
use crate::model::BasisMetric;
use serde::Deserialize;

/// Options for a single scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads for the scan pool. `0` uses one per logical CPU.
    ///
    /// Every filesystem call runs on this pool, so it is also the cap on
    /// concurrent in-flight I/O.
    pub threads: usize,

    /// Descend into directories reached through symbolic links / junctions.
    /// Visited targets are tracked per scan so link cycles terminate.
    pub follow_symlinks: bool,

    /// Metric used for the percent/large-item pass when the scan completes.
    pub basis: BasisMetric,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            follow_symlinks: false,
            basis: BasisMetric::Size,
        }
    }
}

impl ScanConfig {
    /// Number of worker threads actually used.
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.threads
        }
    }
}

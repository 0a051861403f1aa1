/// Scan progress reporting — lightweight messages sent from the scan
/// workers to the consumer via a crossbeam channel.
use crate::platform::VolumeInfo;
use std::time::Duration;

/// Progress updates sent from the scan to its consumer.
///
/// The actual tree data is in the shared `FileTree`; these messages carry
/// only lightweight counters and status flags.
#[derive(Debug)]
pub enum ScanProgress {
    /// The root was classified and its volume probed.
    Started { volume: VolumeInfo },
    /// Periodic update with running totals.
    Update {
        nodes: u64,
        files_found: u64,
        dirs_found: u64,
        total_size: u64,
        current_path: String,
    },
    /// A non-fatal error (e.g. permission denied on one file).
    Error { path: String, message: String },
    /// Scanning completed and percentages/large flags were computed.
    Complete {
        duration: Duration,
        error_count: u64,
    },
    /// Scan was cancelled. The partial tree is left as-is.
    Cancelled,
    /// A root-level error aborted the scan.
    Failed { message: String },
}

impl ScanProgress {
    /// `true` for the message that ends a scan.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::Cancelled | Self::Failed { .. }
        )
    }
}

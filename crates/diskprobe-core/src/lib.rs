/// diskprobe core — scanning, aggregation, and data model.
///
/// This crate contains all scan logic with zero presentation dependencies.
/// Frontends (the bundled CLI, or anything else) start a scan, read the shared
/// tree while it grows, and render the settled result.
///
/// # Modules
///
/// - [`model`] — Arena-allocated file tree and supporting types.
/// - [`scanner`] — Background parallel scanning with progress reporting.
/// - [`analysis`] — Percent-of-parent and large-item passes.
/// - [`platform`] — Directory enumeration, allocation sizes and volume queries.
/// - [`session`] — Owner of the current scan and basis metric.
pub mod analysis;
pub mod config;
pub mod error;
pub mod model;
pub mod platform;
pub mod scanner;
pub mod session;

pub use config::ScanConfig;
pub use error::ScanError;
pub use scanner::{start_scan, start_scan_with, ScanHandle, ScanOutcome, ScanState, ScanStatus};
pub use session::ScanSession;

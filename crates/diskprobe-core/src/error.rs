/// Fatal scan errors.
///
/// Only root-level failures live here. Per-entry I/O problems (access denied,
/// files vanishing mid-scan) are recovered inside the scanner and surface as
/// [`ScanProgress::Error`](crate::scanner::progress::ScanProgress::Error)
/// messages plus `is_error` nodes, never as a `ScanError`.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan root does not exist.
    #[error("scan root {} does not exist", path.display())]
    RootNotFound { path: PathBuf },

    /// The scan root exists but its metadata or listing could not be read.
    #[error("cannot access scan root {}: {source}", path.display())]
    RootAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The volume holding the scan root could not be queried for its
    /// allocation unit (e.g. a removed drive).
    #[error("volume query failed for {}: {source}", path.display())]
    VolumeQuery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The dedicated worker pool could not be created.
    #[error("failed to build scan worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// The scanner thread panicked before reporting an outcome.
    #[error("scanner thread panicked")]
    Panicked,
}

impl ScanError {
    /// Classify an I/O error raised while reading the scan root itself.
    pub fn root(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::RootNotFound { path }
        } else {
            Self::RootAccess { path, source }
        }
    }
}

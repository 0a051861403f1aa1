/// Platform-specific functionality — directory enumeration, volume queries,
/// and on-disk allocation.
///
/// Everything the scanner needs from the operating system goes through the
/// [`FsProvider`] trait. [`OsFs`] is the real implementation; tests swap in
/// in-memory providers to get deterministic cluster sizes and timings.
pub mod disk_usage;
pub mod enumerate;
pub mod volume;

pub use disk_usage::allocated_bytes;
pub use enumerate::{list_dir, DirListing};
pub use volume::{probe_volume, VolumeInfo};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Metadata the scanner needs about a single entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_dir: bool,
    /// Logical length in bytes.
    pub len: u64,
    /// Physical (compressed / block-allocated) size, if the OS reports one.
    pub physical_len: Option<u64>,
    pub modified: Option<SystemTime>,
}

/// The OS filesystem-metadata seam.
///
/// Every call is a potentially blocking syscall and is where the scanner
/// checks for cancellation.
pub trait FsProvider: Send + Sync {
    /// Metadata for `path`. Links are followed only when `follow` is set.
    fn stat(&self, path: &Path, follow: bool) -> io::Result<EntryMeta>;

    /// Immediate children of a directory.
    fn list(&self, dir: &Path) -> io::Result<DirListing>;

    /// Allocation unit and capacity of the volume holding `path`.
    fn volume(&self, path: &Path) -> io::Result<VolumeInfo>;

    /// Resolve a path to its canonical form, used for link-cycle detection.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}

/// [`FsProvider`] backed by the real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFs {
    /// List links that resolve to directories as directories.
    pub follow_symlinks: bool,
}

impl OsFs {
    pub fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }
}

impl FsProvider for OsFs {
    fn stat(&self, path: &Path, follow: bool) -> io::Result<EntryMeta> {
        let meta = if follow {
            fs::metadata(path)?
        } else {
            fs::symlink_metadata(path)?
        };
        let is_dir = meta.is_dir();
        Ok(EntryMeta {
            is_dir,
            len: if is_dir { 0 } else { meta.len() },
            physical_len: if is_dir {
                None
            } else {
                disk_usage::physical_size(path, &meta)
            },
            modified: meta.modified().ok(),
        })
    }

    fn list(&self, dir: &Path) -> io::Result<DirListing> {
        list_dir(dir, self.follow_symlinks)
    }

    fn volume(&self, path: &Path) -> io::Result<VolumeInfo> {
        probe_volume(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_os_stat_file_and_dir() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.bin");
        fs::write(&file, vec![0u8; 300]).unwrap();
        let provider = OsFs::default();

        let meta = provider.stat(&file, false).unwrap();
        assert!(!meta.is_dir);
        assert_eq!(meta.len, 300);
        assert!(meta.modified.is_some());

        let dir = provider.stat(tmp.path(), true).unwrap();
        assert!(dir.is_dir);
        assert_eq!(dir.len, 0);
    }

    #[test]
    fn test_os_stat_missing_entry() {
        let tmp = TempDir::new().unwrap();
        let err = OsFs::default()
            .stat(&tmp.path().join("vanished"), false)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

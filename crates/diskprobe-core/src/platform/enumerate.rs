/// Directory enumeration tolerant of individual unreadable entries.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Immediate children of one directory, already split by kind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// List the immediate subdirectories and files of `dir`.
///
/// Entries whose type cannot be determined are skipped and logged; only a
/// failure to open `dir` itself is returned as an error.
///
/// Symbolic links and junctions are reported as files unless
/// `follow_symlinks` is set, in which case a link resolving to a directory is
/// listed under `dirs`. Dangling links always land in `files`.
pub fn list_dir(dir: &Path, follow_symlinks: bool) -> io::Result<DirListing> {
    let mut listing = DirListing::default();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(path = %dir.display(), "skipping unreadable entry: {err}");
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(err) => {
                debug!(path = %path.display(), "skipping entry with unknown type: {err}");
                continue;
            }
        };

        let is_dir = if file_type.is_symlink() {
            follow_symlinks && fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false)
        } else {
            file_type.is_dir()
        };

        if is_dir {
            listing.dirs.push(path);
        } else {
            listing.files.push(path);
        }
    }

    Ok(listing)
}

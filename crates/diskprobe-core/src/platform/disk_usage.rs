/// On-disk allocation arithmetic and the per-platform physical-size query.
///
/// Windows reports the compressed (physical) size of a file through
/// `GetCompressedFileSizeW`; Unix exposes the allocated block count in
/// `st_blocks`. Either value is then rounded up to a whole number of clusters.
use std::fs::Metadata;
use std::path::Path;

/// Bytes actually allocated for a file of `physical_size` bytes on a volume
/// with `cluster_size`-byte allocation units.
///
/// Computes `ceil(physical / cluster) * cluster`. When the OS could not
/// answer the physical query (`None`), `logical_size` stands in for it. A
/// zero cluster size (unknown volume) returns the physical size unchanged.
pub fn allocated_bytes(logical_size: u64, physical_size: Option<u64>, cluster_size: u64) -> u64 {
    let physical = physical_size.unwrap_or(logical_size);
    if cluster_size == 0 {
        return physical;
    }
    physical.div_ceil(cluster_size).saturating_mul(cluster_size)
}

/// Compressed size of a file, or `None` when the volume cannot answer.
#[cfg(windows)]
pub fn physical_size(path: &Path, _metadata: &Metadata) -> Option<u64> {
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{GetLastError, SetLastError, WIN32_ERROR};
    use windows::Win32::Storage::FileSystem::{GetCompressedFileSizeW, INVALID_FILE_SIZE};

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let mut high: u32 = 0;
    unsafe {
        // Clear any stale code so a 0xFFFFFFFF low dword is not misread.
        SetLastError(WIN32_ERROR(0));
        let low = GetCompressedFileSizeW(PCWSTR(wide.as_ptr()), Some(&mut high as *mut u32));
        // INVALID_FILE_SIZE is only an error when GetLastError is non-zero;
        // otherwise it is a legitimate low dword.
        if low == INVALID_FILE_SIZE && GetLastError().0 != 0 {
            return None;
        }
        Some(((high as u64) << 32) | (low as u64))
    }
}

/// Physical size of a file as reported by the OS (`st_blocks` × 512).
#[cfg(unix)]
pub fn physical_size(_path: &Path, metadata: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.blocks().saturating_mul(512))
}

#[cfg(not(any(windows, unix)))]
pub fn physical_size(_path: &Path, _metadata: &Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_up_to_cluster() {
        // 5000 bytes on 4 KiB clusters occupies two clusters.
        assert_eq!(allocated_bytes(5000, Some(5000), 4096), 8192);
        assert_eq!(allocated_bytes(4096, Some(4096), 4096), 4096);
        assert_eq!(allocated_bytes(1, Some(1), 4096), 4096);
    }

    #[test]
    fn test_empty_file_allocates_nothing() {
        assert_eq!(allocated_bytes(0, Some(0), 4096), 0);
    }

    #[test]
    fn test_compressed_file_uses_physical_size() {
        // 1 MiB logical compressed down to 10 000 bytes.
        assert_eq!(allocated_bytes(1 << 20, Some(10_000), 4096), 12_288);
    }

    #[test]
    fn test_unanswerable_physical_falls_back_to_logical() {
        assert_eq!(allocated_bytes(5000, None, 4096), 8192);
    }

    #[test]
    fn test_zero_cluster_is_passthrough() {
        assert_eq!(allocated_bytes(5000, Some(5000), 0), 5000);
    }

    #[test]
    fn test_cluster_rounding_property() {
        for cluster in [512u64, 1024, 4096, 65_536] {
            for size in [0u64, 1, 511, 512, 513, 4095, 4097, 1_000_003, 7 << 30] {
                let alloc = allocated_bytes(size, Some(size), cluster);
                assert_eq!(alloc % cluster, 0, "size={size} cluster={cluster}");
                assert!(alloc >= size, "size={size} cluster={cluster}");
                assert!(alloc - size < cluster, "size={size} cluster={cluster}");
            }
        }
    }

    #[cfg(windows)]
    #[test]
    fn test_physical_size_ignores_stale_last_error() {
        use windows::Win32::Foundation::{SetLastError, ERROR_ACCESS_DENIED};

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), vec![1u8; 5000]).unwrap();
        let meta = std::fs::metadata(tmp.path()).unwrap();
        unsafe { SetLastError(ERROR_ACCESS_DENIED) };
        assert!(physical_size(tmp.path(), &meta).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_physical_size_of_real_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), vec![1u8; 5000]).unwrap();
        let meta = std::fs::metadata(tmp.path()).unwrap();
        // Block-backed filesystems report whole 512-byte blocks.
        let physical = physical_size(tmp.path(), &meta).unwrap();
        assert_eq!(physical % 512, 0);
    }
}

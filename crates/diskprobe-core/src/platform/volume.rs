/// Volume queries — allocation-unit size plus total/free space.
///
/// The scanner probes the volume once per scan root and caches the result on
/// the tree; no per-file volume call is ever made.
use serde::Serialize;
use std::io;
use std::path::Path;

/// Facts about the volume holding a scan root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeInfo {
    /// Allocation unit (bytes per cluster).
    pub cluster_size: u64,
    /// Capacity in bytes.
    pub total_bytes: u64,
    /// Space available to the calling user, in bytes.
    pub free_bytes: u64,
}

impl VolumeInfo {
    /// Bytes in use on the volume.
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

/// Query the volume that contains `path`.
#[cfg(windows)]
pub fn probe_volume(path: &Path) -> io::Result<VolumeInfo> {
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::Storage::FileSystem::{
        GetDiskFreeSpaceExW, GetDiskFreeSpaceW, GetVolumePathNameW,
    };

    let wide_path: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    // Resolve the mount point ("C:\", "\\server\share\", or a mounted folder);
    // GetDiskFreeSpaceW only accepts volume roots.
    let mut root_buf = [0u16; 1024];
    unsafe { GetVolumePathNameW(PCWSTR(wide_path.as_ptr()), &mut root_buf) }
        .map_err(|_| io::Error::last_os_error())?;
    let root_pcwstr = PCWSTR(root_buf.as_ptr());

    let mut sectors_per_cluster: u32 = 0;
    let mut bytes_per_sector: u32 = 0;
    unsafe {
        GetDiskFreeSpaceW(
            root_pcwstr,
            Some(&mut sectors_per_cluster as *mut u32),
            Some(&mut bytes_per_sector as *mut u32),
            None,
            None,
        )
    }
    .map_err(|_| io::Error::last_os_error())?;

    let mut free_caller: u64 = 0;
    let mut total: u64 = 0;
    unsafe {
        GetDiskFreeSpaceExW(
            root_pcwstr,
            Some(&mut free_caller as *mut u64),
            Some(&mut total as *mut u64),
            None,
        )
    }
    .map_err(|_| io::Error::last_os_error())?;

    Ok(VolumeInfo {
        cluster_size: sectors_per_cluster as u64 * bytes_per_sector as u64,
        total_bytes: total,
        free_bytes: free_caller,
    })
}

/// Query the filesystem that contains `path` via `statvfs`.
#[cfg(unix)]
pub fn probe_volume(path: &Path) -> io::Result<VolumeInfo> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: `statvfs` is a plain-old-data struct; zeroed is a valid value.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: `c_path` is NUL-terminated and `stat` is a valid out pointer.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat as *mut _) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    // f_frsize is the fundamental block size; some filesystems leave it 0.
    let fragment = stat.f_frsize as u64;
    let cluster_size = if fragment > 0 {
        fragment
    } else {
        stat.f_bsize as u64
    };

    Ok(VolumeInfo {
        cluster_size,
        total_bytes: (stat.f_blocks as u64).saturating_mul(cluster_size),
        free_bytes: (stat.f_bavail as u64).saturating_mul(cluster_size),
    })
}

#[cfg(not(any(windows, unix)))]
pub fn probe_volume(_path: &Path) -> io::Result<VolumeInfo> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "volume queries are not supported on this platform",
    ))
}

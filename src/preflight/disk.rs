use std::path::Path;

/// Space on the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub available_bytes: u64,
    pub total_bytes: u64,
}

impl DiskSpace {
    pub fn free_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.available_bytes as f64 / self.total_bytes as f64 * 100.0
    }

    pub fn available_gb(&self) -> f64 {
        self.available_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// Looks up free space for a directory. `None` means it could not be determined.
pub trait DiskProbe: Send + Sync {
    fn space(&self, path: &Path) -> Option<DiskSpace>;
}

/// Reads mounted disks through `sysinfo` and picks the one with the longest
/// mount point containing the path.
#[cfg(feature = "disk-check")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoDiskProbe;

#[cfg(feature = "disk-check")]
impl DiskProbe for SysinfoDiskProbe {
    fn space(&self, path: &Path) -> Option<DiskSpace> {
        let path = std::fs::canonicalize(path).ok()?;
        let disks = sysinfo::Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| DiskSpace {
                available_bytes: disk.available_space(),
                total_bytes: disk.total_space(),
            })
    }
}

/// Used when the crate is built without disk probing.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDiskProbe;

impl DiskProbe for UnavailableDiskProbe {
    fn space(&self, _path: &Path) -> Option<DiskSpace> {
        None
    }
}

pub fn default_disk_probe() -> std::sync::Arc<dyn DiskProbe> {
    #[cfg(feature = "disk-check")]
    {
        std::sync::Arc::new(SysinfoDiskProbe)
    }
    #[cfg(not(feature = "disk-check"))]
    {
        std::sync::Arc::new(UnavailableDiskProbe)
    }
}

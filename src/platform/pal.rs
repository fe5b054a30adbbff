//! Platform trait and host implementations for the two OS queries dsh needs:
//! mount-table enumeration and per-path filesystem statistics.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::errors::{DshError, Result};

/// Free-space snapshot for one mounted volume at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsStats {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub fs_type: String,
    pub mount_point: PathBuf,
    pub is_readonly: bool,
}

/// One row of the host mount table.
///
/// Rows keep the order the kernel reports them in; that order is the
/// tie-break key for capacity selection downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountPoint {
    pub path: PathBuf,
    pub device: String,
    pub fs_type: String,
    pub is_pseudo: bool,
}

/// OS abstraction used by the enumerator and selector.
pub trait Platform: Send + Sync {
    /// Mount table in kernel discovery order, duplicates included.
    fn mount_points(&self) -> Result<Vec<MountPoint>>;
    /// Filesystem statistics for the volume containing `path`.
    fn fs_stats(&self, path: &Path) -> Result<FsStats>;
}

/// Linux platform implementation using `/proc/self/mounts` + `statvfs`.
#[derive(Debug)]
pub struct LinuxPlatform {
    mounts_cache: RwLock<Option<(Vec<MountPoint>, Instant)>>,
    cache_ttl: Duration,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl LinuxPlatform {
    #[must_use]
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            mounts_cache: RwLock::new(None),
            cache_ttl,
        }
    }

    fn cached_mounts(&self) -> Result<Vec<MountPoint>> {
        {
            let cache = self.mounts_cache.read();
            if let Some((mounts, collected_at)) = &*cache
                && collected_at.elapsed() < self.cache_ttl
            {
                return Ok(mounts.clone());
            }
        }

        let raw = fs::read_to_string("/proc/self/mounts").map_err(|source| DshError::Io {
            path: PathBuf::from("/proc/self/mounts"),
            source,
        })?;
        let mounts = parse_mount_table(&raw);

        *self.mounts_cache.write() = Some((mounts.clone(), Instant::now()));
        Ok(mounts)
    }
}

#[cfg(target_os = "linux")]
impl Platform for LinuxPlatform {
    fn mount_points(&self) -> Result<Vec<MountPoint>> {
        self.cached_mounts()
    }

    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        let mounts = self.cached_mounts()?;
        let mount = find_mount(path, &mounts).ok_or_else(|| DshError::FsStats {
            path: path.to_path_buf(),
            details: "path does not belong to any known mount".to_string(),
        })?;
        let stat = nix::sys::statvfs::statvfs(path).map_err(|errno| DshError::FsStats {
            path: path.to_path_buf(),
            details: errno.to_string(),
        })?;
        // Block counts × block size can exceed u64 on hostile/broken
        // filesystems; saturate rather than wrap.
        let block_size = stat.fragment_size();
        Ok(FsStats {
            total_bytes: stat.blocks().saturating_mul(block_size),
            free_bytes: stat.blocks_free().saturating_mul(block_size),
            available_bytes: stat.blocks_available().saturating_mul(block_size),
            fs_type: mount.fs_type.clone(),
            mount_point: mount.path.clone(),
            is_readonly: stat.flags().contains(nix::sys::statvfs::FsFlags::ST_RDONLY),
        })
    }
}

/// In-memory mock implementation for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    mounts: Vec<MountPoint>,
    stats_by_mount: HashMap<PathBuf, FsStats>,
}

impl MockPlatform {
    #[must_use]
    pub fn new(mounts: Vec<MountPoint>, stats_by_mount: HashMap<PathBuf, FsStats>) -> Self {
        Self {
            mounts,
            stats_by_mount,
        }
    }

    /// Register a volume with the given free space; total is sized to fit.
    pub fn add_volume(&mut self, path: impl Into<PathBuf>, fs_type: &str, free_bytes: u64) {
        let path = path.into();
        self.mounts.push(MountPoint {
            path: path.clone(),
            device: format!("mock{}", self.mounts.len()),
            fs_type: fs_type.to_string(),
            is_pseudo: is_pseudo_fs(fs_type),
        });
        self.stats_by_mount.insert(
            path.clone(),
            FsStats {
                total_bytes: free_bytes.saturating_mul(2),
                free_bytes,
                available_bytes: free_bytes,
                fs_type: fs_type.to_string(),
                mount_point: path,
                is_readonly: false,
            },
        );
    }

    /// Register a volume whose capacity query always fails.
    pub fn add_failing_volume(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.mounts.push(MountPoint {
            path,
            device: format!("mock{}", self.mounts.len()),
            fs_type: "ext4".to_string(),
            is_pseudo: false,
        });
        // No stats entry: fs_stats() will fail for this mount.
    }
}

impl Platform for MockPlatform {
    fn mount_points(&self) -> Result<Vec<MountPoint>> {
        Ok(self.mounts.clone())
    }

    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        let mount = find_mount(path, &self.mounts).ok_or_else(|| DshError::FsStats {
            path: path.to_path_buf(),
            details: "mock mount not found".to_string(),
        })?;
        self.stats_by_mount
            .get(&mount.path)
            .cloned()
            .ok_or_else(|| DshError::FsStats {
                path: mount.path.clone(),
                details: "mock stats not found".to_string(),
            })
    }
}

/// Detect the active platform implementation.
pub fn detect_platform(cache_ttl: Duration) -> Result<Arc<dyn Platform>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(LinuxPlatform::new(cache_ttl)))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cache_ttl;
        Err(DshError::UnsupportedPlatform {
            details: "volume enumeration is currently implemented for Linux only".to_string(),
        })
    }
}

/// Parse a `/proc/self/mounts`-format table, preserving row order.
///
/// Malformed lines are skipped with a warning rather than failing the whole
/// parse; the kernel occasionally emits entries for torn-down mounts.
fn parse_mount_table(raw: &str) -> Vec<MountPoint> {
    let mut mounts = Vec::new();
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            eprintln!("[dsh] warning: skipping malformed mount table line: {line}");
            continue;
        }
        let fs_type = fields[2].to_string();
        mounts.push(MountPoint {
            path: decode_mount_path(fields[1]),
            device: fields[0].to_string(),
            is_pseudo: is_pseudo_fs(&fs_type),
            fs_type,
        });
    }
    mounts
}

/// Longest-prefix match of `path` against the mount table.
fn find_mount<'a>(path: &Path, mounts: &'a [MountPoint]) -> Option<&'a MountPoint> {
    mounts
        .iter()
        .filter(|mount| path.starts_with(&mount.path))
        .max_by_key(|mount| mount.path.as_os_str().len())
}

/// Filesystem types that expose no usable storage capacity.
fn is_pseudo_fs(fs_type: &str) -> bool {
    matches!(
        fs_type.to_ascii_lowercase().as_str(),
        "proc"
            | "sysfs"
            | "devpts"
            | "securityfs"
            | "debugfs"
            | "tracefs"
            | "cgroup"
            | "cgroup2"
            | "pstore"
            | "bpf"
            | "configfs"
            | "fusectl"
            | "mqueue"
            | "hugetlbfs"
            | "binfmt_misc"
            | "autofs"
            | "efivarfs"
    )
}

/// Decode the `\NNN` octal escapes the kernel writes into mount paths
/// (space, tab, newline, backslash). Raw bytes are preserved so paths with
/// invalid UTF-8 survive the round trip.
fn decode_mount_path(field: &str) -> PathBuf {
    let raw = field.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut idx = 0;
    while idx < raw.len() {
        let octal = (raw[idx] == b'\\' && idx + 3 < raw.len())
            .then(|| &raw[idx + 1..idx + 4])
            .filter(|digits| digits.iter().all(|d| (b'0'..=b'7').contains(d)));
        if let Some(digits) = octal {
            let value = digits
                .iter()
                .fold(0u8, |acc, d| acc.wrapping_mul(8).wrapping_add(d - b'0'));
            out.push(value);
            idx += 4;
        } else {
            out.push(raw[idx]);
            idx += 1;
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        PathBuf::from(std::ffi::OsString::from_vec(out))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(&out).into_owned())
    }
}

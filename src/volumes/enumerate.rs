//! Volume enumerator: ordered list of mounted volumes from the OS.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::EnumerationConfig;
use crate::core::errors::DshError;
use crate::platform::pal::{MountPoint, Platform};

/// Ordered sequence of volume identifiers, insertion order = discovery order.
/// Duplicates (bind mounts) are not filtered.
pub type VolumeList = Vec<PathBuf>;

/// One enumeration pass: the discovered volumes plus the error that forced
/// an empty result, when the OS query failed.
#[derive(Debug)]
pub struct Enumeration {
    /// Volumes in discovery order.
    pub volumes: VolumeList,
    /// Set when the mount query failed and `volumes` is empty because of it.
    pub degraded: Option<DshError>,
}

/// Queries the platform for currently mounted volumes.
///
/// Enumeration never fails: if the underlying OS query is unavailable, the
/// result is an empty list — absence of volumes is a valid operating
/// condition for the selector to handle.
pub struct VolumeEnumerator {
    platform: Arc<dyn Platform>,
    config: EnumerationConfig,
}

impl VolumeEnumerator {
    /// Build an enumerator over the given platform with the given filters.
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, config: EnumerationConfig) -> Self {
        Self { platform, config }
    }

    /// Enumerate volumes in discovery order.
    pub fn enumerate(&self) -> VolumeList {
        self.enumerate_checked().volumes
    }

    /// Enumerate volumes, reporting whether the pass degraded to an empty
    /// list so callers can record the failure instead of silently treating
    /// it as an empty system.
    pub fn enumerate_checked(&self) -> Enumeration {
        match self.platform.mount_points() {
            Ok(mounts) => Enumeration {
                volumes: mounts
                    .into_iter()
                    .filter(|mount| self.is_eligible(mount))
                    .map(|mount| mount.path)
                    .collect(),
                degraded: None,
            },
            Err(error) => {
                eprintln!("[dsh] warning: volume enumeration unavailable: {error}");
                Enumeration {
                    volumes: Vec::new(),
                    degraded: Some(error),
                }
            }
        }
    }

    fn is_eligible(&self, mount: &MountPoint) -> bool {
        if self.config.skip_pseudo_filesystems && mount.is_pseudo {
            return false;
        }
        !self
            .config
            .excluded_fs_types
            .iter()
            .any(|fs_type| fs_type.eq_ignore_ascii_case(&mount.fs_type))
    }
}

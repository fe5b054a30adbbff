//! Capacity selector: strict-maximum free-space scan over a volume list.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::platform::pal::Platform;
use crate::volumes::enumerate::VolumeList;

/// Outcome of a selection run. Total — there is no partial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionResult {
    /// The volume with strictly-maximum free space.
    Selected { path: PathBuf, free_bytes: u64 },
    /// Input was empty, every capacity query failed, or no volume reported
    /// any free space.
    NoVolumeFound,
}

impl SelectionResult {
    /// Winning path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Selected { path, .. } => Some(path),
            Self::NoVolumeFound => None,
        }
    }
}

/// Scans a volume list and picks the volume with the most free space.
///
/// Free-space readings are taken fresh on every call, never cached across
/// selection runs.
pub struct CapacitySelector {
    platform: Arc<dyn Platform>,
}

impl CapacitySelector {
    /// Build a selector that queries capacity through the given platform.
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Select the volume with strictly-maximum free space.
    ///
    /// Linear scan with a running maximum starting at zero. A volume wins only
    /// when its reading is strictly greater than the incumbent's, so the
    /// first-discovered volume among equal maxima keeps the crown, and a
    /// volume reporting zero free bytes is never selected. Volumes whose
    /// capacity query fails contribute no candidate.
    pub fn select_max_free_space(&self, volumes: &VolumeList) -> SelectionResult {
        let mut winner: Option<PathBuf> = None;
        let mut max_free_bytes: u64 = 0;

        for volume in volumes {
            let free_bytes = match self.platform.fs_stats(volume) {
                Ok(stats) => stats.free_bytes,
                Err(error) => {
                    eprintln!(
                        "[dsh] warning: skipping {}: {error}",
                        volume.display()
                    );
                    continue;
                }
            };
            if free_bytes > max_free_bytes {
                max_free_bytes = free_bytes;
                winner = Some(volume.clone());
            }
        }

        match winner {
            Some(path) => SelectionResult::Selected {
                path,
                free_bytes: max_free_bytes,
            },
            None => SelectionResult::NoVolumeFound,
        }
    }
}

//! Payload store: writes raw bytes to a file at the root of a volume.
//!
//! Thin I/O collaborator outside the enumeration/selection core. Write
//! failures are surfaced to the caller without retry — a second attempt
//! against the same volume has no reason to succeed without caller
//! intervention.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::{StoreConfig, is_bare_filename};
use crate::core::errors::{DshError, Result};
use crate::platform::pal::Platform;
use crate::volumes::enumerate::VolumeList;
use crate::volumes::select::{CapacitySelector, SelectionResult};

/// Write seam between selection and storage, substitutable in tests.
pub trait VolumeWriter {
    /// Write `payload` under `volume`, returning the path written.
    fn store(&self, volume: &Path, filename: Option<&str>, payload: &[u8]) -> Result<PathBuf>;
}

/// Result of the select-then-store pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// A volume won the capacity comparison and the payload was written there.
    Stored(PathBuf),
    /// Selection produced no winner; the writer was never invoked.
    NoVolumeFound,
}

/// Pick the volume with the most free space from `volumes`, then hand the
/// payload to `writer`. The writer is only invoked when selection produces
/// a winner; an empty list or all-failed queries yield
/// [`StoreOutcome::NoVolumeFound`] without any write attempt.
pub fn select_and_store(
    platform: Arc<dyn Platform>,
    volumes: &VolumeList,
    writer: &dyn VolumeWriter,
    filename: Option<&str>,
    payload: &[u8],
) -> Result<StoreOutcome> {
    match CapacitySelector::new(platform).select_max_free_space(volumes) {
        SelectionResult::Selected { path, .. } => {
            let written = writer.store(&path, filename, payload)?;
            Ok(StoreOutcome::Stored(written))
        }
        SelectionResult::NoVolumeFound => Ok(StoreOutcome::NoVolumeFound),
    }
}

/// Writes caller-supplied payloads to a target volume.
pub struct PayloadStore {
    config: StoreConfig,
}

impl PayloadStore {
    /// Build a store using the given settings.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Write `payload` to `<volume>/<filename>`, creating or truncating the
    /// file. Returns the path written. `filename` falls back to the
    /// configured default when `None`.
    pub fn store(&self, volume: &Path, filename: Option<&str>, payload: &[u8]) -> Result<PathBuf> {
        let name = filename.unwrap_or(&self.config.default_filename);
        if !is_bare_filename(name) {
            return Err(DshError::InvalidConfig {
                details: format!("store filename must be a bare file name, got {name:?}"),
            });
        }
        let target = volume.join(name);
        fs::write(&target, payload).map_err(|source| DshError::io(&target, source))?;
        Ok(target)
    }
}

impl VolumeWriter for PayloadStore {
    fn store(&self, volume: &Path, filename: Option<&str>, payload: &[u8]) -> Result<PathBuf> {
        PayloadStore::store(self, volume, filename, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::PayloadStore;
    use crate::core::config::StoreConfig;

    #[test]
    fn writes_payload_to_default_filename() {
        let dir = tempfile::tempdir().expect("create temp volume");
        let store = PayloadStore::new(StoreConfig::default());

        let written = store
            .store(dir.path(), None, b"hello volume")
            .expect("store should succeed");

        assert_eq!(written, dir.path().join("output.txt"));
        assert_eq!(
            std::fs::read(&written).expect("read back"),
            b"hello volume"
        );
    }

    #[test]
    fn explicit_filename_overrides_default() {
        let dir = tempfile::tempdir().expect("create temp volume");
        let store = PayloadStore::new(StoreConfig::default());

        let written = store
            .store(dir.path(), Some("payload.bin"), &[0u8, 255, 7])
            .expect("store should succeed");

        assert_eq!(written, dir.path().join("payload.bin"));
        assert_eq!(std::fs::read(&written).expect("read back"), vec![0u8, 255, 7]);
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().expect("create temp volume");
        let store = PayloadStore::new(StoreConfig::default());

        store
            .store(dir.path(), None, b"first, longer payload")
            .expect("first store");
        let written = store
            .store(dir.path(), None, b"second")
            .expect("second store");

        assert_eq!(std::fs::read(&written).expect("read back"), b"second");
    }

    #[test]
    fn missing_volume_reports_io_error() {
        let store = PayloadStore::new(StoreConfig::default());
        let err = store
            .store(std::path::Path::new("/nonexistent/dsh-volume"), None, b"x")
            .expect_err("write into missing directory must fail");
        assert_eq!(err.code(), "DSH-3001");
    }

    #[test]
    fn rejects_filename_with_separator() {
        let dir = tempfile::tempdir().expect("create temp volume");
        let store = PayloadStore::new(StoreConfig::default());
        let err = store
            .store(dir.path(), Some("../escape.txt"), b"x")
            .expect_err("path traversal must be rejected");
        assert_eq!(err.code(), "DSH-1001");
    }

    #[test]
    fn rejects_dot_component_filenames() {
        let dir = tempfile::tempdir().expect("create temp volume");
        let store = PayloadStore::new(StoreConfig::default());
        for candidate in ["..", "."] {
            let err = store
                .store(dir.path(), Some(candidate), b"x")
                .expect_err("dot components must be rejected");
            assert_eq!(err.code(), "DSH-1001", "{candidate:?} must be rejected");
        }
    }

    #[test]
    fn empty_payload_is_allowed() {
        let dir = tempfile::tempdir().expect("create temp volume");
        let store = PayloadStore::new(StoreConfig::default());
        let written = store
            .store(dir.path(), None, b"")
            .expect("empty payload should store");
        assert_eq!(
            std::fs::metadata(&written).expect("metadata").len(),
            0
        );
    }
}

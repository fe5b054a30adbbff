//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use drive_space_helper::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{DshError, Result};

// Platform
pub use crate::platform::pal::{FsStats, MountPoint, Platform, detect_platform};

// Volumes
pub use crate::volumes::enumerate::{Enumeration, VolumeEnumerator, VolumeList};
pub use crate::volumes::select::{CapacitySelector, SelectionResult};
pub use crate::volumes::store::{PayloadStore, StoreOutcome, VolumeWriter, select_and_store};

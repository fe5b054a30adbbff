#![forbid(unsafe_code)]

//! Drive Space Helper (dsh) — enumerates the volumes mounted on the host,
//! picks the one with the most free space, and stores a payload there.
//!
//! Two-stage pipeline:
//! 1. **Volume enumerator** — ordered list of mount points from the OS
//! 2. **Capacity selector** — strict-maximum free-space scan over that list
//!
//! Both stages talk to the OS only through the [`platform::pal::Platform`]
//! trait, so tests can substitute a fake host without touching real volumes.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use drive_space_helper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use drive_space_helper::core::config::Config;
//! use drive_space_helper::volumes::select::CapacitySelector;
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod platform;
pub mod volumes;

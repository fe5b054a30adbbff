//! DSH-prefixed error types with structured error codes.
//!
//! "No volume found" is deliberately absent here: an empty selection is a
//! normal outcome modeled by [`crate::volumes::select::SelectionResult`],
//! not an error.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, DshError>;

/// Top-level error type for Drive Space Helper.
#[derive(Debug, Error)]
pub enum DshError {
    #[error("[DSH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[DSH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[DSH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[DSH-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[DSH-2001] capacity query failure for {path}: {details}")]
    FsStats { path: PathBuf, details: String },

    #[error("[DSH-2002] mount table parse failure: {details}")]
    MountParse { details: String },

    #[error("[DSH-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[DSH-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DshError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "DSH-1001",
            Self::MissingConfig { .. } => "DSH-1002",
            Self::ConfigParse { .. } => "DSH-1003",
            Self::UnsupportedPlatform { .. } => "DSH-1101",
            Self::FsStats { .. } => "DSH-2001",
            Self::MountParse { .. } => "DSH-2002",
            Self::Serialization { .. } => "DSH-2101",
            Self::Io { .. } => "DSH-3001",
        }
    }

    /// Whether the failure is recoverable by degrading to fewer candidates.
    ///
    /// Recoverable errors shrink the candidate set (a volume is skipped, or
    /// enumeration yields an empty list); the rest surface to the caller.
    #[must_use]
    pub const fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::FsStats { .. } | Self::MountParse { .. } | Self::UnsupportedPlatform { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for DshError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for DshError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

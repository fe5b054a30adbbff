//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{DshError, Result};

/// Full dsh configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub enumeration: EnumerationConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
    pub paths: PathsConfig,
}

/// Volume enumeration filters.
///
/// Both filters default to off so the enumerator passes the mount table
/// through unchanged, duplicates and pseudo-filesystems included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct EnumerationConfig {
    /// Drop kernel pseudo-filesystems (proc, sysfs, cgroup2, ...) from the list.
    pub skip_pseudo_filesystems: bool,
    /// Filesystem types to exclude, matched case-insensitively.
    pub excluded_fs_types: Vec<String>,
}

/// Payload store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// File name written at the root of the winning volume when the caller
    /// does not supply one.
    pub default_filename: String,
}

/// Tuning for the mount-table cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub mount_cache_ttl_ms: u64,
}

/// Filesystem paths used by dsh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_filename: "output.txt".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            mount_cache_ttl_ms: 1_000,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[DSH-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("dsh").join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("dsh")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| DshError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(DshError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        set_env_bool(
            "DSH_ENUMERATION_SKIP_PSEUDO_FILESYSTEMS",
            &mut self.enumeration.skip_pseudo_filesystems,
        )?;
        if let Some(raw) = env_var("DSH_ENUMERATION_EXCLUDED_FS_TYPES") {
            self.enumeration.excluded_fs_types = raw
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(raw) = env_var("DSH_STORE_DEFAULT_FILENAME") {
            self.store.default_filename = raw;
        }

        set_env_u64(
            "DSH_TELEMETRY_MOUNT_CACHE_TTL_MS",
            &mut self.telemetry.mount_cache_ttl_ms,
        )?;

        if let Some(raw) = env_var("DSH_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn normalize(&mut self) {
        for fs_type in &mut self.enumeration.excluded_fs_types {
            *fs_type = fs_type.to_ascii_lowercase();
        }
    }

    fn validate(&self) -> Result<()> {
        let filename = &self.store.default_filename;
        if filename.trim().is_empty() {
            return Err(DshError::InvalidConfig {
                details: "store.default_filename must not be empty".to_string(),
            });
        }
        if !is_bare_filename(filename) {
            return Err(DshError::InvalidConfig {
                details: format!(
                    "store.default_filename must be a bare file name, got {filename:?}"
                ),
            });
        }
        Ok(())
    }
}

/// A valid store filename is exactly one normal path component: no
/// separators, and not `.` or `..`.
pub(crate) fn is_bare_filename(name: &str) -> bool {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    );
    single_normal && !name.contains(['/', '\\'])
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_bool(name: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<bool>().map_err(|error| DshError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| DshError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::core::errors::DshError;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.store.default_filename, "output.txt");
        assert!(!cfg.enumeration.skip_pseudo_filesystems);
        assert!(cfg.enumeration.excluded_fs_types.is_empty());
    }

    #[test]
    fn empty_default_filename_rejected() {
        let mut cfg = Config::default();
        cfg.store.default_filename = "  ".to_string();
        let err = cfg.validate().expect_err("expected validation error");
        match err {
            DshError::InvalidConfig { details } => {
                assert!(details.contains("must not be empty"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_filename_with_separator_rejected() {
        let mut cfg = Config::default();
        cfg.store.default_filename = "nested/output.txt".to_string();
        let err = cfg.validate().expect_err("expected validation error");
        assert!(err.to_string().contains("bare file name"));
    }

    #[test]
    fn default_filename_dot_components_rejected() {
        for candidate in [".", ".."] {
            let mut cfg = Config::default();
            cfg.store.default_filename = candidate.to_string();
            let err = cfg.validate().expect_err("expected validation error");
            assert_eq!(err.code(), "DSH-1001", "{candidate:?} must be rejected");
            assert!(err.to_string().contains("bare file name"));
        }
    }

    #[test]
    fn bare_filename_accepts_single_normal_component_only() {
        assert!(super::is_bare_filename("output.txt"));
        assert!(super::is_bare_filename(".hidden"));
        assert!(!super::is_bare_filename("."));
        assert!(!super::is_bare_filename(".."));
        assert!(!super::is_bare_filename("a/b"));
        assert!(!super::is_bare_filename("a\\b"));
        assert!(!super::is_bare_filename("/abs"));
        assert!(!super::is_bare_filename(""));
    }

    #[test]
    fn normalize_lowercases_excluded_fs_types() {
        let mut cfg = Config::default();
        cfg.enumeration.excluded_fs_types = vec!["TMPFS".to_string(), "NFS4".to_string()];
        cfg.normalize();
        assert_eq!(cfg.enumeration.excluded_fs_types, vec!["tmpfs", "nfs4"]);
    }

    #[test]
    fn load_explicit_missing_path_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/dsh-config.toml")))
            .expect_err("missing explicit config must fail");
        assert_eq!(err.code(), "DSH-1002");
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).expect("create config file");
        writeln!(
            file,
            "[store]\ndefault_filename = \"payload.bin\"\n\n\
             [enumeration]\nskip_pseudo_filesystems = true\n"
        )
        .expect("write config");

        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.store.default_filename, "payload.bin");
        assert!(cfg.enumeration.skip_pseudo_filesystems);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "= broken").expect("write config");
        let err = Config::load(Some(&path)).expect_err("invalid toml must fail");
        assert_eq!(err.code(), "DSH-1003");
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let mut cfg = Config::default();
        cfg.enumeration.excluded_fs_types = vec!["squashfs".to_string()];
        cfg.paths.jsonl_log = PathBuf::from("/tmp/dsh.jsonl");
        let raw = toml::to_string(&cfg).expect("serialize config");
        let parsed: Config = toml::from_str(&raw).expect("reparse config");
        assert_eq!(parsed, cfg);
    }
}

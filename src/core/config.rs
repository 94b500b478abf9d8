//! Configuration system: TOML file + env var overrides + CLI flags.
//!
//! The resulting [`Config`] is built once per run, validated before any
//! filesystem scan starts, and then only read.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HlrError, Result};
use crate::core::paths::{absolutize, split_path_list};

/// Full reconciler configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub link: LinkConfig,
    pub scan: ScanConfig,
    pub paths: PathsConfig,
}

/// Which trees to reconcile and how to apply the result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LinkConfig {
    /// Source roots; every file under them should end up present in the destination.
    pub sources: Vec<PathBuf>,
    /// Extra destination roots scanned only for inodes that already exist.
    pub destinations: Vec<PathBuf>,
    /// Base directory for every created link. Also scanned as a destination root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_destination: Option<PathBuf>,
    /// Print each planned action before executing it.
    pub announce: bool,
    /// Scan and plan, but never touch the filesystem.
    pub dry_run: bool,
}

/// Scanner behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Walk the source forest and the destination forest on separate threads.
    pub parallel: bool,
}

/// Filesystem paths used by hlr itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// JSONL activity log. Logging is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_log: Option<PathBuf>,
}

/// Values supplied on the command line. `None`/`false` leaves the
/// file/env value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub sources: Option<Vec<PathBuf>>,
    pub destinations: Option<Vec<PathBuf>>,
    pub primary_destination: Option<PathBuf>,
    pub announce: bool,
    pub dry_run: bool,
    pub sequential_scan: bool,
    pub activity_log: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[HLR-CONFIG] WARNING: HOME not set, falling back to /tmp for config");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("hlr").join("config.toml"),
            activity_log: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, apply env overrides and
    /// command-line overrides, then normalize and validate.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| HlrError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(HlrError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(|name| env::var(name).ok())?;
        cfg.apply_overrides(overrides);
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a validated config directly from explicit values, bypassing
    /// file and environment lookup.
    pub fn from_overrides(overrides: &ConfigOverrides) -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_overrides(overrides);
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// The primary destination, if one is configured and non-empty.
    #[must_use]
    pub fn primary_destination(&self) -> Option<&Path> {
        self.link
            .primary_destination
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Every root scanned for inodes that already exist at the destination:
    /// the extra destination roots followed by the primary destination.
    #[must_use]
    pub fn destination_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.link.destinations.clone();
        if let Some(primary) = &self.link.primary_destination {
            roots.push(primary.clone());
        }
        roots
    }

    /// Deterministic hash of the effective config for activity logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut var = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = var("HLR_SRC_DIRS") {
            self.link.sources = split_path_list(&raw);
        }
        if let Some(raw) = var("HLR_DST_DIRS") {
            self.link.destinations = split_path_list(&raw);
        }
        if let Some(raw) = var("HLR_DEST") {
            self.link.primary_destination = Some(PathBuf::from(raw.trim()));
        }
        if let Some(raw) = var("HLR_OUTPUT") {
            self.link.announce = parse_env_bool("HLR_OUTPUT", &raw)?;
        }
        if let Some(raw) = var("HLR_DRY") {
            self.link.dry_run = parse_env_bool("HLR_DRY", &raw)?;
        }
        if let Some(raw) = var("HLR_PARALLEL_SCAN") {
            self.scan.parallel = parse_env_bool("HLR_PARALLEL_SCAN", &raw)?;
        }
        if let Some(raw) = var("HLR_ACTIVITY_LOG") {
            self.paths.activity_log = Some(PathBuf::from(raw.trim()));
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(sources) = &overrides.sources {
            self.link.sources.clone_from(sources);
        }
        if let Some(destinations) = &overrides.destinations {
            self.link.destinations.clone_from(destinations);
        }
        if let Some(primary) = &overrides.primary_destination {
            self.link.primary_destination = Some(primary.clone());
        }
        if let Some(log) = &overrides.activity_log {
            self.paths.activity_log = Some(log.clone());
        }
        self.link.announce |= overrides.announce;
        self.link.dry_run |= overrides.dry_run;
        if overrides.sequential_scan {
            self.scan.parallel = false;
        }
    }

    /// Drop empty entries and make every root absolute for consistent
    /// relative-path computation.
    fn normalize_paths(&mut self) {
        let normalize = |paths: &mut Vec<PathBuf>| {
            paths.retain(|p| !p.as_os_str().is_empty());
            for path in paths.iter_mut() {
                *path = absolutize(path);
            }
        };
        normalize(&mut self.link.sources);
        normalize(&mut self.link.destinations);

        self.link.primary_destination = self
            .link
            .primary_destination
            .take()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| absolutize(&p));
    }

    /// Check the invariants every run relies on. Performs no I/O.
    pub fn validate(&self) -> Result<()> {
        if self.primary_destination().is_none() {
            return Err(HlrError::InvalidConfig {
                details: "missing required argument dest (--dest, HLR_DEST, or link.primary_destination)"
                    .to_string(),
            });
        }

        if self.link.sources.is_empty() {
            return Err(HlrError::InvalidConfig {
                details: "missing required argument src_dirs (--src-dirs, HLR_SRC_DIRS, or link.sources)"
                    .to_string(),
            });
        }

        for (field, roots) in [
            ("link.sources", &self.link.sources),
            ("link.destinations", &self.link.destinations),
        ] {
            if let Some(index) = roots.iter().position(|p| p.as_os_str().is_empty()) {
                return Err(HlrError::InvalidConfig {
                    details: format!("{field}[{index}] is an empty path"),
                });
            }
        }

        Ok(())
    }
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(HlrError::ConfigParse {
            context: "env",
            details: format!("{name}={other:?}: expected a boolean"),
        }),
    }
}

//! HLR-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HlrError>;

/// Top-level error type for the hardlink reconciler.
#[derive(Debug, Error)]
pub enum HlrError {
    #[error("[HLR-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HLR-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HLR-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HLR-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[HLR-2001] error walking directory {root} at {path}: {source}")]
    Scan {
        root: PathBuf,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HLR-2002] scan root is not a directory: {root}")]
    NotADirectory { root: PathBuf },

    #[error("[HLR-2003] path {path} is not under scan root {root}")]
    PathOutsideRoot { root: PathBuf, path: PathBuf },

    #[error("[HLR-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HLR-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[HLR-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HLR-3003] cross-device link from {source_path} to {path}")]
    CrossDevice { source_path: PathBuf, path: PathBuf },

    #[error("[HLR-3004] destination already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("[HLR-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HlrError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HLR-1001",
            Self::MissingConfig { .. } => "HLR-1002",
            Self::ConfigParse { .. } => "HLR-1003",
            Self::UnsupportedPlatform { .. } => "HLR-1101",
            Self::Scan { .. } => "HLR-2001",
            Self::NotADirectory { .. } => "HLR-2002",
            Self::PathOutsideRoot { .. } => "HLR-2003",
            Self::Serialization { .. } => "HLR-2101",
            Self::PermissionDenied { .. } => "HLR-3001",
            Self::Io { .. } => "HLR-3002",
            Self::CrossDevice { .. } => "HLR-3003",
            Self::AlreadyExists { .. } => "HLR-3004",
            Self::Runtime { .. } => "HLR-3900",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap a walk failure with the root being scanned and the entry that failed.
    #[must_use]
    pub fn scan(root: impl AsRef<Path>, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Scan {
            root: root.as_ref().to_path_buf(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for HlrError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HlrError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

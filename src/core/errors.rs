//! LSW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, LswError>;

/// Top-level error type for linksweep.
#[derive(Debug, Error)]
pub enum LswError {
    #[error("[LSW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LSW-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LSW-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LSW-1004] instance {name} ({mount_path}) rejected: {details}")]
    InstanceConflict {
        name: String,
        mount_path: PathBuf,
        details: String,
    },

    #[error("[LSW-1005] media directory unavailable {path}: {details}")]
    MediaDirUnavailable { path: PathBuf, details: String },

    #[error("[LSW-2002] mount for instance {instance} unavailable at {path}: {details}")]
    MountUnavailable {
        instance: String,
        path: PathBuf,
        details: String,
    },

    #[error("[LSW-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LSW-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LswError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LSW-1001",
            Self::MissingConfig { .. } => "LSW-1002",
            Self::ConfigParse { .. } => "LSW-1003",
            Self::InstanceConflict { .. } => "LSW-1004",
            Self::MediaDirUnavailable { .. } => "LSW-1005",
            Self::MountUnavailable { .. } => "LSW-2002",
            Self::Serialization { .. } => "LSW-2101",
            Self::Io { .. } => "LSW-3002",
        }
    }

    /// The filesystem path the failure is about, when there is one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::MissingConfig { path }
            | Self::MediaDirUnavailable { path, .. }
            | Self::MountUnavailable { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::InstanceConflict { mount_path, .. } => Some(mount_path),
            _ => None,
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
}

impl From<serde_json::Error> for LswError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for LswError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{LswError, Result};
use crate::core::paths::{is_within, normalize_syntactic};
use crate::scanner::instances::InstanceRegistry;

/// Full linksweep configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Root of the media library whose symlinks are audited.
    pub media_dir: PathBuf,
    pub logging: LoggingConfig,
    pub scan: ScanConfig,
    pub instances: Vec<InstanceConfig>,
    /// Where this config was loaded from. Not part of the file format.
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// One `[[instances]]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub mount_path: PathBuf,
    /// Sub-folders of `media_dir` holding this instance's links.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_folders: Vec<String>,
}

/// Per-run JSONL log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub json: bool,
}

/// Walker bounds and mount safety.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    pub max_depth: usize,
    /// Regexes matched against entry file names.
    pub exclude_patterns: Vec<String>,
    pub excluded_paths: Vec<PathBuf>,
    /// Refuse to scan when a mount path exists but is not an active mountpoint.
    pub require_active_mounts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("/data/media"),
            logging: LoggingConfig::default(),
            scan: ScanConfig::default(),
            instances: Vec::new(),
            config_file: Self::default_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: home_dir()
                .join(".local")
                .join("share")
                .join("linksweep")
                .join("logs"),
            json: true,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            exclude_patterns: Vec::new(),
            excluded_paths: Vec::new(),
            require_active_mounts: false,
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[LSW-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir()
            .join(".config")
            .join("linksweep")
            .join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, &|name| env::var(name).ok())
    }

    /// Same as [`Config::load`] with an injectable environment lookup.
    pub fn load_with_env(
        path: Option<&Path>,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| LswError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::from_toml_str(&raw)?
        } else if is_explicit_path {
            return Err(LswError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides(lookup)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic hash of the effective config for run logs.
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

    /// Directories the walker starts from.
    ///
    /// `media_dir` alone unless some instance lists `media_folders`; then the
    /// union of those folders in config order, with duplicates and roots nested
    /// under an earlier root removed.
    pub fn scan_roots(&self) -> Vec<PathBuf> {
        let folders: Vec<&String> = self
            .instances
            .iter()
            .flat_map(|instance| instance.media_folders.iter())
            .collect();
        if folders.is_empty() {
            return vec![self.media_dir.clone()];
        }

        let candidates: Vec<PathBuf> = folders
            .into_iter()
            .map(|folder| normalize_syntactic(&self.media_dir.join(folder)))
            .collect();

        let mut roots: Vec<PathBuf> = Vec::with_capacity(candidates.len());
        for (idx, root) in candidates.iter().enumerate() {
            let covered = candidates.iter().enumerate().any(|(other_idx, other)| {
                if other_idx == idx {
                    return false;
                }
                if other == root {
                    // Keep the first occurrence of an exact duplicate.
                    return other_idx < idx;
                }
                is_within(root, other)
            });
            if !covered {
                roots.push(root.clone());
            }
        }
        roots
    }

    /// Compile `scan.exclude_patterns`.
    pub fn exclude_regexes(&self) -> Result<Vec<Regex>> {
        self.scan
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|error| LswError::InvalidConfig {
                    details: format!("scan.exclude_patterns entry {pattern:?}: {error}"),
                })
            })
            .collect()
    }

    fn apply_env_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = var("LINKSWEEP_MEDIA_DIR") {
            self.media_dir = PathBuf::from(raw);
        }
        if let Some(raw) = var("LINKSWEEP_LOG_DIR") {
            self.logging.dir = PathBuf::from(raw);
        }
        if let Some(raw) = var("LINKSWEEP_JSON_LOG") {
            self.logging.json = parse_env_bool("LINKSWEEP_JSON_LOG", &raw)?;
        }
        if let Some(raw) = var("LINKSWEEP_MAX_DEPTH") {
            self.scan.max_depth = raw.parse::<usize>().map_err(|error| LswError::ConfigParse {
                context: "env",
                details: format!("LINKSWEEP_MAX_DEPTH={raw:?}: {error}"),
            })?;
        }
        Ok(())
    }

    fn normalize_paths(&mut self) {
        self.media_dir = normalize_syntactic(&self.media_dir);
        self.logging.dir = normalize_syntactic(&self.logging.dir);
        for path in &mut self.scan.excluded_paths {
            *path = normalize_syntactic(path);
        }
        for instance in &mut self.instances {
            instance.mount_path = normalize_syntactic(&instance.mount_path);
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.media_dir.is_absolute() {
            return Err(LswError::InvalidConfig {
                details: format!("media_dir must be absolute, got {}", self.media_dir.display()),
            });
        }

        if self.scan.max_depth == 0 {
            return Err(LswError::InvalidConfig {
                details: "scan.max_depth must be > 0".to_string(),
            });
        }

        for path in &self.scan.excluded_paths {
            if !path.is_absolute() {
                return Err(LswError::InvalidConfig {
                    details: format!(
                        "scan.excluded_paths entries must be absolute, got {}",
                        path.display()
                    ),
                });
            }
        }

        self.exclude_regexes()?;

        for instance in &self.instances {
            for folder in &instance.media_folders {
                validate_media_folder(&instance.name, folder)?;
            }
        }

        InstanceRegistry::from_config(&self.instances)?;
        Ok(())
    }
}

/// A media folder must be a plain relative path that stays under `media_dir`.
fn validate_media_folder(instance: &str, folder: &str) -> Result<()> {
    let path = Path::new(folder);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if folder.trim().is_empty() || escapes {
        return Err(LswError::InvalidConfig {
            details: format!(
                "instances.{instance}.media_folders entry {folder:?} must be a relative path inside media_dir"
            ),
        });
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| LswError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

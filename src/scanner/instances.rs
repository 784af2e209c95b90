//! Instance registry: the configured debrid mounts a link target may fall under.
//!
//! Mount paths are validated at registration so that `match_target` can never
//! be ambiguous: every mount path is absolute, and no mount path is equal to,
//! or nested inside, another one.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::InstanceConfig;
use crate::core::errors::{LswError, Result};
use crate::core::paths::{is_within, normalize_syntactic};

/// One configured download-manager mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub name: String,
    pub mount_path: PathBuf,
    /// Free-form label (e.g. "movies") carried into summaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Immutable-after-load set of instances, matched by mount-path prefix.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    instances: Vec<Instance>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration, rejecting the first conflicting entry.
    pub fn from_config(entries: &[InstanceConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for entry in entries {
            registry.register_instance(Instance {
                name: entry.name.clone(),
                mount_path: entry.mount_path.clone(),
                category: entry.category.clone(),
            })?;
        }
        Ok(registry)
    }

    /// Register `name` mounted at `mount_path`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        mount_path: impl AsRef<Path>,
    ) -> Result<()> {
        self.register_instance(Instance {
            name: name.into(),
            mount_path: mount_path.as_ref().to_path_buf(),
            category: None,
        })
    }

    pub fn register_instance(&mut self, mut instance: Instance) -> Result<()> {
        let conflict = |instance: &Instance, details: String| LswError::InstanceConflict {
            name: instance.name.clone(),
            mount_path: instance.mount_path.clone(),
            details,
        };

        if instance.name.trim().is_empty() {
            return Err(conflict(
                &instance,
                "instance name must not be empty".to_string(),
            ));
        }
        if !instance.mount_path.is_absolute() {
            return Err(conflict(&instance, "mount_path must be absolute".to_string()));
        }

        instance.mount_path = normalize_syntactic(&instance.mount_path);
        if instance.mount_path.parent().is_none() {
            return Err(conflict(
                &instance,
                "mount_path must not be the filesystem root".to_string(),
            ));
        }

        for existing in &self.instances {
            if existing.name == instance.name {
                return Err(conflict(
                    &instance,
                    format!(
                        "duplicate instance name (already mounted at {})",
                        existing.mount_path.display()
                    ),
                ));
            }
            if is_within(&instance.mount_path, &existing.mount_path)
                || is_within(&existing.mount_path, &instance.mount_path)
            {
                return Err(conflict(
                    &instance,
                    format!(
                        "mount_path overlaps instance {} at {}",
                        existing.name,
                        existing.mount_path.display()
                    ),
                ));
            }
        }

        self.instances.push(instance);
        Ok(())
    }

    /// The instance whose mount path contains `target`, compared component-wise.
    pub fn match_target(&self, target: &Path) -> Option<&Instance> {
        self.instances
            .iter()
            .find(|instance| is_within(target, &instance.mount_path))
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|instance| instance.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

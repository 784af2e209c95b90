//! Mount preflight: every instance's mount must be present before scanning.
//!
//! A dropped remote mount makes every link under it look broken, so a scan
//! against a missing mount would classify the whole library as deletable.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{LswError, Result};
use crate::logger::events::{Event, EventEmitter};
use crate::scanner::instances::{Instance, InstanceRegistry};

/// Result of checking one instance's mount path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountStatus {
    pub instance: String,
    pub mount_path: PathBuf,
    /// An active mountpoint, as opposed to a plain directory on the parent fs.
    pub mounted: bool,
}

/// Check every registered mount, emitting `mount_checked` for each.
///
/// Fails on the first mount that is missing or not traversable, and on an
/// inactive mountpoint when `require_active` is set.
pub fn check_mounts(
    registry: &InstanceRegistry,
    require_active: bool,
    emitter: &EventEmitter,
) -> Result<Vec<MountStatus>> {
    let mut statuses = Vec::with_capacity(registry.len());
    for instance in registry.iter() {
        let status = check_one(instance)?;
        emitter.emit(Event::MountChecked {
            instance: status.instance.clone(),
            category: instance.category.clone(),
            mount_path: status.mount_path.clone(),
            mounted: status.mounted,
        });
        if require_active && !status.mounted {
            return Err(unavailable(
                instance,
                "exists but is not an active mountpoint".to_string(),
            ));
        }
        statuses.push(status);
    }
    Ok(statuses)
}

fn check_one(instance: &Instance) -> Result<MountStatus> {
    let path = instance.mount_path.as_path();
    let meta = fs::metadata(path).map_err(|err| unavailable(instance, err.to_string()))?;
    if !meta.is_dir() {
        return Err(unavailable(instance, "not a directory".to_string()));
    }
    check_traversable(path).map_err(|details| unavailable(instance, details))?;

    Ok(MountStatus {
        instance: instance.name.clone(),
        mount_path: instance.mount_path.clone(),
        mounted: is_mountpoint(path),
    })
}

fn unavailable(instance: &Instance, details: String) -> LswError {
    LswError::MountUnavailable {
        instance: instance.name.clone(),
        path: instance.mount_path.clone(),
        details,
    }
}

#[cfg(unix)]
fn check_traversable(path: &Path) -> std::result::Result<(), String> {
    use nix::unistd::{AccessFlags, access};

    access(path, AccessFlags::R_OK | AccessFlags::X_OK)
        .map_err(|errno| format!("not readable: {}", errno.desc()))
}

#[cfg(not(unix))]
fn check_traversable(path: &Path) -> std::result::Result<(), String> {
    fs::read_dir(path)
        .map(|_| ())
        .map_err(|err| format!("not readable: {err}"))
}

/// A directory is a mountpoint when it sits on a different device than its
/// parent, or is its own parent (the filesystem root).
#[cfg(unix)]
pub fn is_mountpoint(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    let Ok(parent) = fs::metadata(path.join("..")) else {
        return false;
    };
    meta.dev() != parent.dev() || meta.ino() == parent.ino()
}

#[cfg(not(unix))]
pub fn is_mountpoint(path: &Path) -> bool {
    path.is_dir()
}

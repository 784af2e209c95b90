//! Pure classification of one scan entry against the instance registry.

#![allow(missing_docs)]

use serde::Serialize;

use crate::scanner::instances::InstanceRegistry;
use crate::scanner::walker::{ScanEntry, TargetState};

/// Outcome of classifying a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Healthy,
    /// Target missing under a registered mount.
    BrokenKnownMount {
        instance: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        category: Option<String>,
    },
    /// Target missing and outside every registered mount.
    BrokenUnknownTarget,
    /// Could not tell. Never eligible for deletion.
    ResolutionError { error: String },
}

impl Classification {
    /// Eligible for deletion in execute modes.
    pub const fn is_broken(&self) -> bool {
        matches!(
            self,
            Self::BrokenKnownMount { .. } | Self::BrokenUnknownTarget
        )
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::BrokenKnownMount { .. } => "broken_known_mount",
            Self::BrokenUnknownTarget => "broken_unknown_target",
            Self::ResolutionError { .. } => "resolution_error",
        }
    }
}

/// Classify `entry`. Performs no I/O; the walker already statted the target.
pub fn classify(entry: &ScanEntry, registry: &InstanceRegistry) -> Classification {
    if !entry.is_symlink {
        let error = match &entry.target_state {
            TargetState::Unreachable { error } => error.clone(),
            _ => "not a symlink".to_string(),
        };
        return Classification::ResolutionError { error };
    }

    match &entry.target_state {
        TargetState::Unreachable { error } => Classification::ResolutionError {
            error: error.clone(),
        },
        TargetState::Exists => Classification::Healthy,
        TargetState::Missing => {
            let matched = entry
                .resolved_target
                .as_deref()
                .and_then(|target| registry.match_target(target));
            match matched {
                Some(instance) => Classification::BrokenKnownMount {
                    instance: instance.name.clone(),
                    category: instance.category.clone(),
                },
                None => Classification::BrokenUnknownTarget,
            }
        }
    }
}

//! One audit run: preflight, scan every root, then apply the run mode.
//!
//! Control flow is strictly sequential. The full scan finishes (the walker
//! is drained into the decision set) before the executor touches the tree.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::time::Instant;

use crate::core::config::Config;
use crate::core::errors::{LswError, Result};
use crate::logger::events::{Event, EventEmitter};
use crate::scanner::decision_set::{DecisionSet, DecisionSetBuilder};
use crate::scanner::deletion::{Confirm, DeletionExecutor, RunMode, RunOutcome};
use crate::scanner::instances::InstanceRegistry;
use crate::scanner::mounts::{MountStatus, check_mounts};
use crate::scanner::walker::{ScanEntry, WalkerConfig, walk};

/// A validated, preflighted run ready to scan.
#[derive(Debug)]
pub struct Session<'a> {
    config: &'a Config,
    emitter: &'a EventEmitter,
    registry: InstanceRegistry,
    walker_config: WalkerConfig,
    mounts: Vec<MountStatus>,
}

impl<'a> Session<'a> {
    /// Check the media directory and every mount. Nothing is scanned yet.
    pub fn prepare(config: &'a Config, emitter: &'a EventEmitter) -> Result<Self> {
        let media_dir = &config.media_dir;
        let meta = fs::metadata(media_dir).map_err(|err| LswError::MediaDirUnavailable {
            path: media_dir.clone(),
            details: err.to_string(),
        })?;
        if !meta.is_dir() {
            return Err(LswError::MediaDirUnavailable {
                path: media_dir.clone(),
                details: "not a directory".to_string(),
            });
        }

        let registry = InstanceRegistry::from_config(&config.instances)?;
        let walker_config = WalkerConfig {
            max_depth: config.scan.max_depth,
            excluded_paths: config.scan.excluded_paths.iter().cloned().collect::<HashSet<_>>(),
            exclude_patterns: config.exclude_regexes()?,
        };
        let mounts = check_mounts(&registry, config.scan.require_active_mounts, emitter)?;

        Ok(Self {
            config,
            emitter,
            registry,
            walker_config,
            mounts,
        })
    }

    pub fn mounts(&self) -> &[MountStatus] {
        &self.mounts
    }

    /// Walk every root to completion and build the decision set.
    pub fn scan(&self) -> Result<DecisionSet> {
        let started = Instant::now();
        let mut builder = DecisionSetBuilder::new();

        for root in self.config.scan_roots() {
            if root != self.config.media_dir
                && let Err(err) = fs::symlink_metadata(&root)
                && err.kind() == ErrorKind::NotFound
            {
                self.emitter.emit(Event::RootSkipped {
                    root,
                    reason: "configured media folder does not exist".to_string(),
                });
                continue;
            }

            self.emitter.emit(Event::ScanStarted { root: root.clone() });
            match walk(&root, self.walker_config.clone()) {
                Ok(walker) => {
                    builder.consume(walker, &self.registry, self.emitter);
                }
                // Only media_dir itself is fatal; a bad media folder is one entry.
                Err(err) if root != self.config.media_dir => {
                    let details = match err {
                        LswError::MediaDirUnavailable { details, .. } => details,
                        other => other.to_string(),
                    };
                    let entry = ScanEntry::listing_failed(root, details);
                    builder.consume([entry], &self.registry, self.emitter);
                }
                Err(err) => return Err(err),
            }
        }

        let set = builder.finish();
        self.emitter.emit(Event::ScanCompleted {
            summary: set.summary().clone(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        Ok(set)
    }

    /// Scan, then apply `mode`.
    pub fn run(&self, mode: RunMode, confirm: &mut dyn Confirm) -> Result<RunOutcome> {
        let set = self.scan()?;
        Ok(DeletionExecutor::new(self.emitter).execute(&set, mode, confirm))
    }
}

/// Run a full audit and always return an outcome.
///
/// Fatal errors are reported as `run_failed` followed by a `run_completed`
/// carrying exit code 1.
pub fn run(
    config: &Config,
    mode: RunMode,
    emitter: &EventEmitter,
    confirm: &mut dyn Confirm,
) -> RunOutcome {
    emitter.emit(Event::RunStarted {
        mode,
        media_dir: config.media_dir.clone(),
        roots: config.scan_roots(),
        instances: config.instances.len(),
        config_hash: config.stable_hash().ok(),
    });

    let outcome = match Session::prepare(config, emitter).and_then(|s| s.run(mode, confirm)) {
        Ok(outcome) => outcome,
        Err(err) => {
            emitter.emit(Event::RunFailed {
                code: err.code().to_string(),
                message: err.to_string(),
                path: err.path().map(std::path::Path::to_path_buf),
            });
            let outcome = RunOutcome::fatal(mode);
            emitter.emit(Event::RunCompleted {
                outcome: outcome.clone(),
            });
            outcome
        }
    };
    emitter.flush();
    outcome
}

//! Deletion executor: unlinks broken symlinks according to the run mode.
//!
//! Pipeline: decision set -> mode gate (dry-run / confirmation) -> per-item
//! pre-flight -> unlink -> verify -> run outcome.
//!
//! Pre-flight checks before each unlink:
//! 1. Path still exists (another run may have cleaned it)
//! 2. Path is still a symlink (never remove a file that replaced the link)
//! 3. Target still does not exist (the mount may have come back). A target
//!    that can no longer be checked at all is skipped, never unlinked.
//!
//! A failing item is recorded and skipped; it never aborts the batch.

#![allow(missing_docs)]

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::logger::events::{Event, EventEmitter};
use crate::scanner::decision_set::{Decision, DecisionSet};
use crate::scanner::walker::is_missing;

// ──────────────────── run mode ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    DryRun,
    ExecuteConfirm,
    ExecuteAuto,
}

impl RunMode {
    /// `auto_confirm` upgrades an execute run to unattended; alone it does nothing.
    pub const fn from_flags(execute: bool, auto_confirm: bool) -> Self {
        match (execute, auto_confirm) {
            (false, _) => Self::DryRun,
            (true, false) => Self::ExecuteConfirm,
            (true, true) => Self::ExecuteAuto,
        }
    }

    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::DryRun => "dry-run",
            Self::ExecuteConfirm => "execute (confirm)",
            Self::ExecuteAuto => "execute (auto)",
        }
    }
}

// ──────────────────── exit status ────────────────────

/// Process exit contract consumed by schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Nothing broken.
    Clean = 0,
    /// Scan could not complete.
    Fatal = 1,
    /// Broken links found and left in place.
    BrokenRetained = 2,
    /// Broken links found and at least one removed.
    Deleted = 3,
}

impl ExitStatus {
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Exit status of a run that completed its scan.
pub const fn exit_status(mode: RunMode, broken: usize, deleted: usize) -> ExitStatus {
    if broken == 0 {
        ExitStatus::Clean
    } else if mode.is_dry_run() || deleted == 0 {
        ExitStatus::BrokenRetained
    } else {
        ExitStatus::Deleted
    }
}

// ──────────────────── report types ────────────────────

/// Why an item was not removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Vanished,
    NoLongerSymlink,
    TargetReappeared,
    /// Statting the target failed for a reason other than absence.
    TargetUnresolvable,
    Io,
}

impl FailureReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vanished => "path vanished",
            Self::NoLongerSymlink => "no longer a symlink",
            Self::TargetReappeared => "target resolves again",
            Self::TargetUnresolvable => "target can no longer be checked",
            Self::Io => "io error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub reason: FailureReason,
    pub error: String,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub mode: RunMode,
    /// Broken entries at scan time.
    pub items_considered: usize,
    pub items_deleted: usize,
    pub items_skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DeletionFailure>,
    pub exit_code: i32,
}

impl RunOutcome {
    /// Outcome of a run that never produced a decision set.
    pub const fn fatal(mode: RunMode) -> Self {
        Self {
            mode,
            items_considered: 0,
            items_deleted: 0,
            items_skipped: 0,
            failures: Vec::new(),
            exit_code: ExitStatus::Fatal.code(),
        }
    }

    fn retained(mode: RunMode, broken: usize) -> Self {
        Self {
            mode,
            items_considered: broken,
            items_deleted: 0,
            items_skipped: broken,
            failures: Vec::new(),
            exit_code: exit_status(mode, broken, 0).code(),
        }
    }
}

// ──────────────────── confirmation ────────────────────

/// The single yes/no gate of an `ExecuteConfirm` run.
pub trait Confirm {
    /// Asked once, after the scan, with the number of broken links.
    fn confirm(&mut self, count: usize) -> bool;
}

impl<F: FnMut(usize) -> bool> Confirm for F {
    fn confirm(&mut self, count: usize) -> bool {
        self(count)
    }
}

// ──────────────────── executor ────────────────────

/// Where a run stands after [`DeletionExecutor::begin`].
pub enum ExecutionStep<'a> {
    Finished(RunOutcome),
    AwaitingConfirmation(PendingConfirmation<'a>),
}

/// An `ExecuteConfirm` run blocked on its one decision.
pub struct PendingConfirmation<'a> {
    executor: &'a DeletionExecutor<'a>,
    set: &'a DecisionSet,
}

impl PendingConfirmation<'_> {
    pub fn count(&self) -> usize {
        self.set.broken_count()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.set.broken().map(|d| d.entry.path.clone()).collect()
    }

    /// Apply the decision and finish the run.
    pub fn resume(self, accepted: bool) -> RunOutcome {
        self.executor
            .emitter
            .emit(Event::ConfirmationResult { accepted });
        let outcome = if accepted {
            self.executor.delete_all(self.set, RunMode::ExecuteConfirm)
        } else {
            RunOutcome::retained(RunMode::ExecuteConfirm, self.set.broken_count())
        };
        self.executor.complete(outcome)
    }
}

type Unlink = fn(&Path) -> io::Result<()>;

/// Applies a [`DecisionSet`] to the filesystem.
#[derive(Debug)]
pub struct DeletionExecutor<'e> {
    emitter: &'e EventEmitter,
    unlink: Unlink,
}

impl<'e> DeletionExecutor<'e> {
    pub fn new(emitter: &'e EventEmitter) -> Self {
        Self {
            emitter,
            unlink: |path: &Path| fs::remove_file(path),
        }
    }

    #[cfg(test)]
    fn with_unlink(emitter: &'e EventEmitter, unlink: Unlink) -> Self {
        Self { emitter, unlink }
    }

    /// Run to completion, asking `confirm` when the mode requires it.
    pub fn execute(
        &self,
        set: &DecisionSet,
        mode: RunMode,
        confirm: &mut dyn Confirm,
    ) -> RunOutcome {
        match self.begin(set, mode) {
            ExecutionStep::Finished(outcome) => outcome,
            ExecutionStep::AwaitingConfirmation(pending) => {
                let accepted = confirm.confirm(pending.count());
                pending.resume(accepted)
            }
        }
    }

    /// Start a run. Only `ExecuteConfirm` with broken entries stops to wait.
    pub fn begin<'a>(&'a self, set: &'a DecisionSet, mode: RunMode) -> ExecutionStep<'a> {
        let broken = set.broken_count();
        if broken == 0 || mode == RunMode::DryRun {
            return ExecutionStep::Finished(self.complete(RunOutcome::retained(mode, broken)));
        }
        match mode {
            RunMode::ExecuteAuto => {
                ExecutionStep::Finished(self.complete(self.delete_all(set, mode)))
            }
            _ => {
                let pending = PendingConfirmation {
                    executor: self,
                    set,
                };
                self.emitter.emit(Event::ConfirmationRequested {
                    count: pending.count(),
                    paths: pending.paths(),
                });
                ExecutionStep::AwaitingConfirmation(pending)
            }
        }
    }

    fn delete_all(&self, set: &DecisionSet, mode: RunMode) -> RunOutcome {
        let mut outcome = RunOutcome {
            mode,
            items_considered: set.broken_count(),
            items_deleted: 0,
            items_skipped: 0,
            failures: Vec::new(),
            exit_code: 0,
        };

        for decision in set.broken() {
            match unlink_broken(decision, self.unlink) {
                Ok(()) => {
                    outcome.items_deleted += 1;
                    self.emitter.emit(Event::ItemDeleted {
                        path: decision.entry.path.clone(),
                    });
                }
                Err(failure) => {
                    outcome.items_skipped += 1;
                    self.emitter.emit(Event::ItemDeleteFailed {
                        path: failure.path.clone(),
                        error: format!("{}: {}", failure.reason.label(), failure.error),
                    });
                    outcome.failures.push(failure);
                }
            }
        }

        outcome.exit_code =
            exit_status(mode, outcome.items_considered, outcome.items_deleted).code();
        outcome
    }

    fn complete(&self, outcome: RunOutcome) -> RunOutcome {
        self.emitter.emit(Event::RunCompleted {
            outcome: outcome.clone(),
        });
        outcome
    }
}

// ──────────────────── per-item deletion ────────────────────

fn unlink_broken(
    decision: &Decision,
    unlink: Unlink,
) -> std::result::Result<(), DeletionFailure> {
    let path = decision.entry.path.as_path();
    let fail = |reason: FailureReason, error: String| DeletionFailure {
        path: path.to_path_buf(),
        reason,
        error,
    };

    preflight(path).map_err(|(reason, error)| fail(reason, error))?;

    unlink(path).map_err(|e| fail(FailureReason::Io, e.to_string()))?;

    // Post-deletion verification: the link itself should be gone.
    if fs::symlink_metadata(path).is_ok() {
        return Err(fail(
            FailureReason::Io,
            "path still exists after unlink".to_string(),
        ));
    }
    Ok(())
}

fn preflight(path: &Path) -> std::result::Result<(), (FailureReason, String)> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err((FailureReason::Vanished, e.to_string()));
        }
        Err(e) => return Err((FailureReason::Io, e.to_string())),
    };
    if !meta.file_type().is_symlink() {
        return Err((
            FailureReason::NoLongerSymlink,
            "entry was replaced since the scan".to_string(),
        ));
    }
    match fs::metadata(path) {
        Ok(_) => Err((
            FailureReason::TargetReappeared,
            "target became reachable since the scan".to_string(),
        )),
        Err(e) if is_missing(&e) => Ok(()),
        Err(e) => Err((FailureReason::TargetUnresolvable, e.to_string())),
    }
}

//! Structured run events and the emitter that fans them out to sinks.
//!
//! The core never formats human-readable output. Every observable step of a
//! run is an [`Event`]; sinks decide how (and whether) to render it. The
//! emitter is an ordinary value built by the caller and passed by reference
//! to each component, so tests can attach a [`MemorySink`] and inspect the
//! exact sequence a run produced.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::scanner::classifier::Classification;
use crate::scanner::decision_set::ScanSummary;
use crate::scanner::deletion::{RunMode, RunOutcome};

/// Severity level attached to each event in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Everything a run reports, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    RunStarted {
        mode: RunMode,
        media_dir: PathBuf,
        roots: Vec<PathBuf>,
        instances: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        config_hash: Option<String>,
    },
    MountChecked {
        instance: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        mount_path: PathBuf,
        mounted: bool,
    },
    ScanStarted {
        root: PathBuf,
    },
    RootSkipped {
        root: PathBuf,
        reason: String,
    },
    EntryClassified {
        path: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<PathBuf>,
        classification: Classification,
    },
    ScanCompleted {
        summary: ScanSummary,
        duration_ms: u64,
    },
    ConfirmationRequested {
        count: usize,
        paths: Vec<PathBuf>,
    },
    ConfirmationResult {
        accepted: bool,
    },
    ItemDeleted {
        path: PathBuf,
    },
    ItemDeleteFailed {
        path: PathBuf,
        error: String,
    },
    RunCompleted {
        outcome: RunOutcome,
    },
    RunFailed {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

impl Event {
    /// Snake-case event name, identical to the serialized `event` tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::MountChecked { .. } => "mount_checked",
            Self::ScanStarted { .. } => "scan_started",
            Self::RootSkipped { .. } => "root_skipped",
            Self::EntryClassified { .. } => "entry_classified",
            Self::ScanCompleted { .. } => "scan_completed",
            Self::ConfirmationRequested { .. } => "confirmation_requested",
            Self::ConfirmationResult { .. } => "confirmation_result",
            Self::ItemDeleted { .. } => "item_deleted",
            Self::ItemDeleteFailed { .. } => "item_delete_failed",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::EntryClassified { classification, .. } => {
                if matches!(classification, Classification::Healthy) {
                    Severity::Info
                } else {
                    Severity::Warning
                }
            }
            Self::MountChecked { mounted: false, .. }
            | Self::RootSkipped { .. }
            | Self::ConfirmationResult { accepted: false }
            | Self::ItemDeleteFailed { .. } => Severity::Warning,
            Self::RunFailed { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }
}

/// A consumer of run events (console presenter, JSONL file, test recorder).
pub trait EventSink {
    fn handle(&self, event: &Event);

    fn flush(&self) {}
}

/// Fan-out point for events. Holds no global state.
#[derive(Default)]
pub struct EventEmitter {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sink<S: EventSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.handle(&event);
        }
    }

    pub fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Records every event in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(Event::name).collect()
    }
}

impl EventSink for MemorySink {
    fn handle(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use linksweep::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, InstanceConfig};
pub use crate::core::errors::{LswError, Result};

// Logger
pub use crate::logger::events::{Event, EventEmitter, EventSink, MemorySink, Severity};
pub use crate::logger::jsonl::{JsonlSink, JsonlWriter};

// Scanner
pub use crate::scanner::classifier::{Classification, classify};
pub use crate::scanner::decision_set::{Decision, DecisionSet, DecisionSetBuilder, ScanSummary};
pub use crate::scanner::deletion::{
    Confirm, DeletionExecutor, ExitStatus, RunMode, RunOutcome, exit_status,
};
pub use crate::scanner::instances::{Instance, InstanceRegistry};
pub use crate::scanner::session::{Session, run};
pub use crate::scanner::walker::{ScanEntry, SymlinkWalker, TargetState, WalkerConfig, walk};

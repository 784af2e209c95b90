#![forbid(unsafe_code)]

//! linksweep: broken-symlink auditor for media libraries backed by debrid mounts.
//!
//! A run walks the media directory, classifies every symlink against the
//! configured mount instances, and removes the broken ones according to the
//! run mode:
//! 1. **Dry run**: report only, never touch the tree
//! 2. **Execute (confirm)**: one yes/no gate after the scan
//! 3. **Execute (auto)**: unattended, for schedulers
//!
//! The process exit code (0 clean, 1 fatal, 2 broken kept, 3 deleted) is the
//! contract consumed by cron jobs and timers.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use linksweep::prelude::*;
//!
//! let config = Config::load(None).unwrap();
//! let emitter = EventEmitter::new();
//! let outcome = run(&config, RunMode::DryRun, &emitter, &mut |_: usize| false);
//! std::process::exit(outcome.exit_code);
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use linksweep::scanner::walker::{WalkerConfig, walk};
//! use linksweep::scanner::classifier::classify;
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod scanner;

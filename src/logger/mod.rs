//! Run events, event sinks, and the per-run JSONL log.

pub mod events;
pub mod jsonl;

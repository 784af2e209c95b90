//! Symlink audit: instance registry, walker, classifier, decision set, deletion.

pub mod classifier;
pub mod decision_set;
pub mod deletion;
pub mod instances;
pub mod mounts;
pub mod session;
pub mod walker;

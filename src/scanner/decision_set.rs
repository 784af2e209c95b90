//! Aggregation of classified entries into the immutable per-run report.
//!
//! The builder drains the walker completely before anything else may look
//! at the tree, so deletion never interleaves with directory iteration.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::Serialize;

use crate::logger::events::{Event, EventEmitter};
use crate::scanner::classifier::{Classification, classify};
use crate::scanner::instances::InstanceRegistry;
use crate::scanner::walker::ScanEntry;

/// A non-healthy entry and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub entry: ScanEntry,
    pub classification: Classification,
}

impl Decision {
    pub fn is_broken(&self) -> bool {
        self.classification.is_broken()
    }
}

/// Counts reported at the end of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Every entry the walker yielded, synthetic ones included.
    pub total_entries: usize,
    pub total_symlinks: usize,
    pub healthy: usize,
    pub broken_known_mount: usize,
    pub broken_unknown_target: usize,
    pub resolution_errors: usize,
    /// Subset of `resolution_errors` that are directories left unwalked:
    /// unlistable, or deeper than `max_depth`.
    pub unreadable_dirs: usize,
    pub broken_by_instance: BTreeMap<String, usize>,
    /// Known-mount breakage grouped by instance category, when configured.
    pub broken_by_category: BTreeMap<String, usize>,
}

impl ScanSummary {
    pub fn broken_count(&self) -> usize {
        self.broken_known_mount + self.broken_unknown_target
    }

    fn record(&mut self, entry: &ScanEntry, classification: &Classification) {
        self.total_entries += 1;
        if entry.is_symlink {
            self.total_symlinks += 1;
        }
        match classification {
            Classification::Healthy => self.healthy += 1,
            Classification::BrokenKnownMount { instance, category } => {
                self.broken_known_mount += 1;
                *self.broken_by_instance.entry(instance.clone()).or_default() += 1;
                if let Some(category) = category {
                    *self.broken_by_category.entry(category.clone()).or_default() += 1;
                }
            }
            Classification::BrokenUnknownTarget => self.broken_unknown_target += 1,
            Classification::ResolutionError { .. } => {
                self.resolution_errors += 1;
                if !entry.is_symlink {
                    self.unreadable_dirs += 1;
                }
            }
        }
    }

    /// Fold another root's counts into this one.
    pub fn merge(&mut self, other: &Self) {
        self.total_entries += other.total_entries;
        self.total_symlinks += other.total_symlinks;
        self.healthy += other.healthy;
        self.broken_known_mount += other.broken_known_mount;
        self.broken_unknown_target += other.broken_unknown_target;
        self.resolution_errors += other.resolution_errors;
        self.unreadable_dirs += other.unreadable_dirs;
        for (instance, count) in &other.broken_by_instance {
            *self.broken_by_instance.entry(instance.clone()).or_default() += count;
        }
        for (category, count) in &other.broken_by_category {
            *self.broken_by_category.entry(category.clone()).or_default() += count;
        }
    }
}

/// Result of one complete scan. Holds only non-healthy entries, in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionSet {
    decisions: Vec<Decision>,
    summary: ScanSummary,
}

impl DecisionSet {
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    /// Entries eligible for deletion.
    pub fn broken(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(|d| d.is_broken())
    }

    pub fn broken_count(&self) -> usize {
        self.summary.broken_count()
    }

    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Accumulates classifications until [`DecisionSetBuilder::finish`].
#[derive(Debug, Default)]
pub struct DecisionSetBuilder {
    decisions: Vec<Decision>,
    summary: ScanSummary,
}

impl DecisionSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ScanEntry, classification: Classification) {
        self.summary.record(&entry, &classification);
        if classification != Classification::Healthy {
            self.decisions.push(Decision {
                entry,
                classification,
            });
        }
    }

    /// Drain `entries`, classifying each one and emitting `entry_classified`.
    ///
    /// Returns this pass's own counts; the builder accumulates across calls.
    pub fn consume<I>(
        &mut self,
        entries: I,
        registry: &InstanceRegistry,
        emitter: &EventEmitter,
    ) -> ScanSummary
    where
        I: IntoIterator<Item = ScanEntry>,
    {
        let mut pass = ScanSummary::default();
        for entry in entries {
            let classification = classify(&entry, registry);
            pass.record(&entry, &classification);
            emitter.emit(Event::EntryClassified {
                path: entry.path.clone(),
                target: entry.target.clone(),
                classification: classification.clone(),
            });
            self.record(entry, classification);
        }
        pass
    }

    pub fn finish(self) -> DecisionSet {
        DecisionSet {
            decisions: self.decisions,
            summary: self.summary,
        }
    }
}

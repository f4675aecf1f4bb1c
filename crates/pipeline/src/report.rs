//! Batch outcome summaries

use serde::Serialize;
use std::fmt;

/// One unit that did not make it into the stage output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    pub unit_id: String,
    pub kind: String,
    pub cause: String,
}

impl UnitFailure {
    pub fn new(unit_id: impl Into<String>, kind: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            kind: kind.into(),
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub stage: String,
    pub processed: usize,
    pub skipped: usize,
    pub failed: Vec<UnitFailure>,
}

impl BatchReport {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            ..Default::default()
        }
    }

    pub fn record_processed(&mut self) {
        self.processed += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, failure: UnitFailure) {
        self.failed.push(failure);
    }

    /// Add counts from a sub-report (e.g. one chunk of a scoring batch)
    pub fn absorb(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed.extend(other.failed);
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} processed, {} skipped, {} failed",
            self.stage,
            self.processed,
            self.skipped,
            self.failed.len()
        )
    }
}

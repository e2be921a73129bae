//! Collect per-item outcomes into one batch report.
//!
//! The aggregator is the single owner of every outcome. Workers never touch
//! it directly: they send [`ItemOutcome`]s over a channel and the orchestrator
//! records them here, in whatever order they arrive.
//!
//! [`ResultAggregator::finalize`] sorts the entries by input index, so the
//! report is identical across runs no matter how the pool scheduled work.
//! Live console output keeps arrival order.

use crate::resolve::DownloadFailure;
use crate::types::{FailureKind, ItemOutcome, OutcomeResult};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReportError {
    #[error("Expected {expected} outcomes, got {received}")]
    MissingOutcomes { expected: usize, received: usize },
}

/// A manifest URL that never became a source item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadFailureEntry {
    pub entry: String,
    pub reason: String,
}

impl From<&DownloadFailure> for DownloadFailureEntry {
    fn from(failure: &DownloadFailure) -> Self {
        Self {
            entry: failure.entry.clone(),
            reason: failure.error.to_string(),
        }
    }
}

/// Final summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total_items: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub entries: Vec<ItemOutcome>,
    pub download_failures: Vec<DownloadFailureEntry>,
}

/// How the process should exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Every resolved item succeeded and every remote entry was fetched.
    Success,
    /// At least one item or download failed.
    ItemFailures,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::ItemFailures => 1,
        }
    }
}

impl BatchReport {
    pub fn exit_status(&self) -> ExitStatus {
        if self.failed == 0 && self.download_failures.is_empty() {
            ExitStatus::Success
        } else {
            ExitStatus::ItemFailures
        }
    }

    /// Failed entries grouped by kind, for the summary line.
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.result, OutcomeResult::Failure(f) if f.kind == kind))
            .count()
    }
}

/// Accumulates outcomes for a batch of known size.
#[derive(Debug)]
pub struct ResultAggregator {
    expected: usize,
    entries: Vec<ItemOutcome>,
    download_failures: Vec<DownloadFailureEntry>,
}

impl ResultAggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            entries: Vec::with_capacity(expected),
            download_failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        self.entries.push(outcome);
    }

    pub fn record_download_failure(&mut self, failure: DownloadFailureEntry) {
        self.download_failures.push(failure);
    }

    /// Close the batch. Fails if any expected outcome never arrived.
    pub fn finalize(mut self) -> Result<BatchReport, ReportError> {
        if self.entries.len() != self.expected {
            return Err(ReportError::MissingOutcomes {
                expected: self.expected,
                received: self.entries.len(),
            });
        }
        self.entries.sort_by_key(|e| e.index);
        let succeeded = self.entries.iter().filter(|e| e.is_success()).count();
        Ok(BatchReport {
            total_items: self.expected,
            succeeded,
            failed: self.expected - succeeded,
            entries: self.entries,
            download_failures: self.download_failures,
        })
    }
}

//! Concurrent batch transformation.
//!
//! The [`Orchestrator`] owns an explicitly sized rayon pool and dispatches
//! exactly one [`transform`] per resolved item. It is the only place in the
//! crate that creates concurrency.
//!
//! ```text
//!            ┌─ worker ─ transform(item 0) ─┐
//! items ─────┼─ worker ─ transform(item 1) ─┼──▶ mpsc ──▶ aggregator thread ──▶ BatchReport
//!            └─ worker ─ transform(item N) ─┘                  │
//!                                                              └──▶ progress Sender (optional)
//! ```
//!
//! ## Failure Isolation
//!
//! Every task returns an [`ItemOutcome`], never an error. A [`ScaleError`]
//! becomes a [`TransformFailure`], and a panic inside the codec is caught at
//! the task boundary and reported as [`FailureKind::Panicked`]. Nothing is
//! retried and there is no early exit: the batch always runs to completion.
//!
//! ## Pool Size
//!
//! The worker bound caps how many decoded pixel buffers can be alive at once.
//! The pool is built per orchestrator rather than installed globally, so tests
//! can run with small pools side by side.
//!
//! [`ScaleError`]: crate::transform::ScaleError

use crate::config::JobConfig;
use crate::imaging::ImageBackend;
use crate::report::{BatchReport, DownloadFailureEntry, ReportError, ResultAggregator};
use crate::resolve::Resolution;
use crate::transform::transform;
use crate::types::{FailureKind, ItemOutcome, OutcomeResult, SourceItem, TransformFailure};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Result aggregation failed: {0}")]
    Report(#[from] ReportError),
    #[error("Result aggregator thread panicked")]
    AggregatorPanicked,
}

/// Bounded worker pool plus the join barrier for one batch at a time.
pub struct Orchestrator {
    pool: rayon::ThreadPool,
}

impl Orchestrator {
    /// Build a pool with exactly `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self, ProcessError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("scaler-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Transform every item and block until all of them have settled.
    ///
    /// When `events` is given, each outcome is forwarded there as it arrives,
    /// before the report is finalized.
    pub fn run(
        &self,
        backend: &impl ImageBackend,
        items: &[SourceItem],
        job: &JobConfig,
        events: Option<Sender<ItemOutcome>>,
    ) -> Result<BatchReport, ProcessError> {
        self.dispatch(backend, items, job, ResultAggregator::new(items.len()), events)
    }

    /// Like [`run`](Self::run), carrying the resolver's download failures into the report.
    pub fn run_resolved(
        &self,
        backend: &impl ImageBackend,
        resolution: &Resolution,
        job: &JobConfig,
        events: Option<Sender<ItemOutcome>>,
    ) -> Result<BatchReport, ProcessError> {
        let mut aggregator = ResultAggregator::new(resolution.items.len());
        for failure in &resolution.download_failures {
            aggregator.record_download_failure(DownloadFailureEntry::from(failure));
        }
        self.dispatch(backend, &resolution.items, job, aggregator, events)
    }

    fn dispatch(
        &self,
        backend: &impl ImageBackend,
        items: &[SourceItem],
        job: &JobConfig,
        mut aggregator: ResultAggregator,
        events: Option<Sender<ItemOutcome>>,
    ) -> Result<BatchReport, ProcessError> {
        tracing::info!(items = items.len(), workers = self.workers(), "dispatching batch");
        let (tx, rx) = mpsc::channel::<ItemOutcome>();

        let aggregator = thread::scope(|scope| {
            // Single consumer: the aggregator is never shared between threads.
            let collector = scope.spawn(move || {
                for outcome in rx {
                    if let Some(events) = &events {
                        // A closed progress receiver must not stop aggregation.
                        events.send(outcome.clone()).ok();
                    }
                    aggregator.record(outcome);
                }
                aggregator
            });

            self.pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .for_each_with(tx, |tx, (index, item)| {
                        tx.send(run_one(backend, index, item, job)).ok();
                    });
            });

            // Every Sender clone is dropped once for_each_with returns,
            // which ends the collector's loop.
            collector.join()
        })
        .map_err(|_| ProcessError::AggregatorPanicked)?;

        let report = aggregator.finalize()?;
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            download_failures = report.download_failures.len(),
            "batch complete"
        );
        Ok(report)
    }
}

/// Run one transform inside the task boundary.
fn run_one(
    backend: &impl ImageBackend,
    index: usize,
    item: &SourceItem,
    job: &JobConfig,
) -> ItemOutcome {
    let result = match panic::catch_unwind(AssertUnwindSafe(|| transform(backend, item, job))) {
        Ok(Ok(result)) => OutcomeResult::Success(result),
        Ok(Err(err)) => {
            tracing::warn!(item = %item.path().display(), kind = %err.kind(), "{err}");
            OutcomeResult::Failure(err.into_failure(item.clone()))
        }
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            tracing::warn!(item = %item.path().display(), "transform panicked: {detail}");
            OutcomeResult::Failure(TransformFailure {
                item: item.clone(),
                kind: FailureKind::Panicked,
                detail,
            })
        }
    };
    ItemOutcome { index, result }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

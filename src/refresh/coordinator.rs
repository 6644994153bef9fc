//! Refresh coordinator - main refresh orchestration logic
//!
//! This module ties the pipeline together:
//! - Reading and filtering candidates
//! - Building the HTTP client and the scheduler
//! - Opening the batch transaction and preparing its statement
//! - Running dispatch and the single writer side by side
//! - Committing once every worker has finished
//!
//! Setup failures abort the run before any worker starts. Per-item failures
//! only show up in the [`RefreshReport`].

use crate::refresh::fetcher::build_http_client;
use crate::refresh::scheduler::{InFlightGauge, Scheduler};
use crate::refresh::worker::{FetchContext, WriteRequest};
use crate::refresh::RefreshOptions;
use crate::state::ItemOutcome;
use crate::storage::{BookmarkStore, ContentBatch, Storage};
use crate::strategy::StrategyRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Aggregated result of one refresh run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Bookmarks read from the store
    pub candidates: usize,

    /// Candidates filtered out before dispatch (outdated-only runs)
    pub skipped: usize,

    pub unchanged: usize,

    /// Bookmarks whose new content was written
    pub updated: usize,

    pub exhausted: usize,

    pub extract_failed: usize,

    pub persist_failed: usize,

    /// Workers that panicked
    pub panicked: usize,

    /// Most fetches observed on the wire at once
    pub peak_in_flight: usize,

    pub elapsed: Duration,
}

impl RefreshReport {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Unchanged(_) => self.unchanged += 1,
            ItemOutcome::Changed => self.updated += 1,
            ItemOutcome::Exhausted => self.exhausted += 1,
            ItemOutcome::ExtractFailed => self.extract_failed += 1,
            ItemOutcome::PersistFailed => self.persist_failed += 1,
        }
    }

    /// Candidates that reached a terminal outcome
    pub fn processed(&self) -> usize {
        self.unchanged
            + self.updated
            + self.exhausted
            + self.extract_failed
            + self.persist_failed
            + self.panicked
    }

    pub fn failed(&self) -> usize {
        self.exhausted + self.extract_failed + self.persist_failed + self.panicked
    }
}

/// Runs a complete refresh over the store
///
/// # Arguments
///
/// * `store` - The bookmark store; its connection is owned by the writer for the whole run
/// * `registry` - Site strategies, shared read-only with every worker
/// * `options` - Concurrency, retry and selection options
///
/// # Returns
///
/// * `Ok(RefreshReport)` - The run finished and its batch was committed
/// * `Err(ReshelfError)` - Setup or commit failed; nothing was written
pub async fn run_refresh(
    store: &mut BookmarkStore,
    registry: Arc<StrategyRegistry>,
    options: RefreshOptions,
) -> crate::Result<RefreshReport> {
    let start = Instant::now();
    let mut report = RefreshReport::default();

    let mut candidates = store.fetch_candidates(options.uncached_only, &registry)?;
    report.candidates = candidates.len();

    if options.outdated_only {
        candidates.retain(|candidate| candidate.outdated);
        report.skipped = report.candidates - candidates.len();
    }
    if options.resets_cache() {
        for candidate in &mut candidates {
            candidate.reset_cache();
        }
    }

    tracing::info!(
        "Refreshing {} bookmarks ({} skipped) with {} threads",
        candidates.len(),
        report.skipped,
        options.threads
    );

    let client = build_http_client(&options)?;
    let scheduler = Scheduler::new(options.threads, options.effective_early_release_slots());
    let gauge = Arc::new(InFlightGauge::default());

    let batch = store.begin_content_batch()?;
    let (writer, requests) = mpsc::channel(options.threads.max(1));

    let context = Arc::new(FetchContext {
        client,
        registry,
        policy: options.retry,
        writer,
        gauge: Arc::clone(&gauge),
    });

    let (dispatched, write_failures) = tokio::join!(
        scheduler.dispatch(candidates, context),
        drain_writes(&batch, requests)
    );

    batch.commit()?;

    for outcome in dispatched.outcomes {
        report.record(outcome);
    }
    report.panicked = dispatched.panicked;
    report.peak_in_flight = gauge.peak();
    report.elapsed = start.elapsed();

    if write_failures > 0 {
        tracing::warn!("{} content updates could not be stored", write_failures);
    }
    tracing::info!(
        "Refresh finished in {:.2?}: {} updated, {} unchanged, {} failed",
        report.elapsed,
        report.updated,
        report.unchanged,
        report.failed()
    );

    Ok(report)
}

/// The single writer: applies updates until every worker dropped its sender
///
/// Returns the number of updates that failed.
async fn drain_writes(batch: &ContentBatch<'_>, mut requests: mpsc::Receiver<WriteRequest>) -> usize {
    let mut failures = 0;

    while let Some(request) = requests.recv().await {
        let stored = match batch.update_content(&request.update) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(id = request.update.id, error = %e, "Error storing content");
                failures += 1;
                false
            }
        };
        // The worker may have been cancelled; the result stands either way
        let _ = request.done.send(stored);
    }

    failures
}

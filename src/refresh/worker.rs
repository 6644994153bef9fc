//! Fetch worker: the per-candidate retry loop
//!
//! A worker owns one candidate and one concurrency slot. It fetches with
//! retries, runs change detection, extracts text when the page changed and
//! hands the result to the single writer. Every failure ends in an
//! [`ItemOutcome`]; nothing propagates past the worker.

use crate::refresh::detector::{detect, CachedSignals, Detection};
use crate::refresh::extract::extract_text;
use crate::refresh::fetcher::{fetch_page, FetchedPage};
use crate::refresh::scheduler::{InFlightGauge, Slot};
use crate::state::{AttemptState, ItemOutcome, RetryPolicy};
use crate::storage::{ContentUpdate, FetchCandidate};
use crate::strategy::StrategyRegistry;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// New content for the writer plus a channel reporting whether it was stored
#[derive(Debug)]
pub struct WriteRequest {
    pub update: ContentUpdate,
    pub done: oneshot::Sender<bool>,
}

/// Everything workers of one run share
pub struct FetchContext {
    pub client: Client,
    pub registry: Arc<StrategyRegistry>,
    pub policy: RetryPolicy,
    pub writer: mpsc::Sender<WriteRequest>,
    pub gauge: Arc<InFlightGauge>,
}

/// Refreshes one candidate
///
/// # State Flow
///
/// 1. Fetch with retries (`AttemptState`); the second attempt tries to
///    move the worker into a background slot
/// 2. Change detection against the cached hash and Last-Modified
/// 3. Extraction (site strategy, else generic HTML to text)
/// 4. Send the update to the writer and wait for its verdict
pub async fn process_candidate(
    context: Arc<FetchContext>,
    candidate: FetchCandidate,
    mut slot: Slot,
) -> ItemOutcome {
    let Some(page) = fetch_with_retries(&context, &candidate, &mut slot).await else {
        tracing::warn!(
            id = candidate.id,
            title = %candidate.title,
            "Could not fetch, giving up"
        );
        return ItemOutcome::Exhausted;
    };

    let (body, hash, last_modified) = match detect(&CachedSignals::from(&candidate), page) {
        Detection::Unchanged(reason) => {
            tracing::info!(id = candidate.id, title = %candidate.title, %reason, "Not modified");
            return ItemOutcome::Unchanged(reason);
        }
        Detection::Changed {
            body,
            hash,
            last_modified,
        } => (body, hash, last_modified),
    };

    let content = match extract_text(&body, &candidate.href, &context.registry) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(
                id = candidate.id,
                title = %candidate.title,
                error = %e,
                "Could not convert page to text"
            );
            return ItemOutcome::ExtractFailed;
        }
    };

    let (done, stored) = oneshot::channel();
    let request = WriteRequest {
        update: ContentUpdate {
            id: candidate.id,
            content,
            hash,
            modified: last_modified,
            version: context.registry.version_for(&candidate.href),
        },
        done,
    };

    if context.writer.send(request).await.is_err() {
        tracing::error!(id = candidate.id, title = %candidate.title, "Writer is gone");
        return ItemOutcome::PersistFailed;
    }

    match stored.await {
        Ok(true) => {
            tracing::info!(id = candidate.id, title = %candidate.title, "Fetched successfully");
            ItemOutcome::Changed
        }
        _ => ItemOutcome::PersistFailed,
    }
}

async fn fetch_with_retries(
    context: &FetchContext,
    candidate: &FetchCandidate,
    slot: &mut Slot,
) -> Option<FetchedPage> {
    let mut state = AttemptState::start();

    while let Some(attempt) = state.attempt() {
        if state.is_retry_attempt() && slot.release_early() {
            tracing::debug!(id = candidate.id, "Retrying in a background slot");
        }

        let result = {
            let _in_flight = context.gauge.enter();
            fetch_page(&context.client, &context.registry, candidate).await
        };

        match result {
            Ok(page) => {
                state = state.succeed();
                tracing::debug!(id = candidate.id, attempt, ?state, "Fetch attempt succeeded");
                return Some(page);
            }
            Err(e) => {
                state = state.fail(&context.policy);
                let retrying = matches!(state, AttemptState::Retry(_));

                if e.is_connection_reset() {
                    tracing::warn!(
                        id = candidate.id,
                        title = %candidate.title,
                        attempt,
                        error = %e,
                        "Connection reset, possibly blocked by a firewall"
                    );
                } else if retrying {
                    tracing::warn!(
                        id = candidate.id,
                        title = %candidate.title,
                        attempt,
                        error = %e,
                        "Error fetching, retrying in {:?}",
                        context.policy.delay
                    );
                } else {
                    tracing::warn!(
                        id = candidate.id,
                        title = %candidate.title,
                        attempt,
                        error = %e,
                        "Error fetching"
                    );
                }

                if retrying {
                    tokio::time::sleep(context.policy.delay).await;
                    state = state.advance();
                }
            }
        }
    }

    None
}

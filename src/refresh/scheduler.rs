//! Scheduler for bounding and dispatching fetch workers
//!
//! This module handles:
//! - The foreground semaphore every dispatched worker takes a slot from
//! - The background pool retrying workers move into (early release)
//! - Spawning one task per candidate and collecting the outcomes
//! - Tracking how many fetches are in flight
//!
//! A worker fetches only while holding exactly one permit, foreground or
//! background, so at most `threads + early_release_slots` fetches are ever
//! in flight.

use crate::refresh::worker::{process_candidate, FetchContext};
use crate::state::ItemOutcome;
use crate::storage::FetchCandidate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// Concurrency slot held by one worker
///
/// Starts in the foreground pool. A retrying worker may trade it for a
/// background slot so a fresh candidate can start in its place.
#[derive(Debug)]
pub struct Slot {
    foreground: Option<OwnedSemaphorePermit>,
    background: Option<OwnedSemaphorePermit>,
    /// `None` when early release is disabled
    pool: Option<Arc<Semaphore>>,
}

impl Slot {
    /// Moves into a background slot, freeing the foreground one
    ///
    /// Returns false, keeping the foreground slot, when early release is
    /// disabled or the background pool is full.
    pub fn release_early(&mut self) -> bool {
        if self.background.is_some() {
            return true;
        }
        let Some(pool) = &self.pool else {
            return false;
        };

        match Arc::clone(pool).try_acquire_owned() {
            Ok(permit) => {
                self.background = Some(permit);
                self.foreground = None;
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_background(&self) -> bool {
        self.background.is_some()
    }
}

/// Counts fetches currently on the wire and the highest count seen
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    /// Marks a fetch as started until the guard is dropped
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { gauge: self }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct InFlightGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Outcomes of a dispatch, in completion order
#[derive(Debug, Default)]
pub struct Dispatched {
    pub outcomes: Vec<ItemOutcome>,
    /// Workers that panicked instead of returning an outcome
    pub panicked: usize,
}

/// Two-tier permit scheduler
pub struct Scheduler {
    foreground: Arc<Semaphore>,
    background: Option<Arc<Semaphore>>,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `threads` - Foreground slots (at least one is always available)
    /// * `early_release_slots` - Background slots; 0 disables early release
    pub fn new(threads: usize, early_release_slots: usize) -> Self {
        let background = if early_release_slots > 0 {
            Some(Arc::new(Semaphore::new(early_release_slots)))
        } else {
            None
        };

        Self {
            foreground: Arc::new(Semaphore::new(threads.max(1))),
            background,
        }
    }

    /// Waits for a foreground slot
    ///
    /// Returns `None` only if the semaphore was closed.
    pub async fn acquire(&self) -> Option<Slot> {
        let permit = Arc::clone(&self.foreground).acquire_owned().await.ok()?;
        Some(Slot {
            foreground: Some(permit),
            background: None,
            pool: self.background.clone(),
        })
    }

    /// Upper bound on concurrent fetches
    pub fn capacity(&self) -> usize {
        self.foreground.available_permits()
            + self
                .background
                .as_ref()
                .map(|pool| pool.available_permits())
                .unwrap_or(0)
    }

    /// Runs one worker per candidate and waits for all of them
    ///
    /// Dispatch blocks on the foreground semaphore, so candidates start as
    /// slots free up. The context is dropped once every worker finished,
    /// which closes the write channel.
    pub async fn dispatch(
        &self,
        candidates: Vec<FetchCandidate>,
        context: Arc<FetchContext>,
    ) -> Dispatched {
        let mut tasks = JoinSet::new();

        for candidate in candidates {
            let Some(slot) = self.acquire().await else {
                tracing::error!("Concurrency limiter closed, stopping dispatch");
                break;
            };
            tracing::trace!(id = candidate.id, href = %candidate.href, "Dispatching");
            tasks.spawn(process_candidate(Arc::clone(&context), candidate, slot));
        }
        drop(context);

        let mut dispatched = Dispatched::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => dispatched.outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Fetch worker panicked");
                    dispatched.panicked += 1;
                }
            }
        }
        dispatched
    }
}

//! State module for tracking refresh progress
//!
//! # Components
//!
//! - `AttemptState` / `RetryPolicy`: retry state machine of a single fetch
//! - `ItemOutcome`: terminal state of a candidate, aggregated into the run report

mod attempt;
mod outcome;

// Re-export main types
pub use attempt::{AttemptState, RetryPolicy};
pub use outcome::{ItemOutcome, UnchangedReason};

//! Retry state machine for a single fetch
//!
//! ```text
//! Attempt(1) --ok--> Success
//!     |
//!   fail (budget left) --> Retry(1) --> Attempt(2) --ok--> Success
//!     |                                     |
//!   fail (budget spent) --> Exhausted     fail ...
//! ```

use std::time::Duration;

/// How often and how patiently a fetch is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,

    /// Pause between a failed attempt and the next one
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy; at least one attempt is always made
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(3000))
    }
}

/// Where a fetch stands in its retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Attempt `n` (1-based) is in progress
    Attempt(u32),

    /// Attempt `n` failed and another is allowed
    Retry(u32),

    Success,

    /// Attempt budget spent
    Exhausted,
}

impl AttemptState {
    pub fn start() -> Self {
        Self::Attempt(1)
    }

    /// Transition after the current attempt succeeded
    pub fn succeed(self) -> Self {
        match self {
            Self::Attempt(_) => Self::Success,
            other => other,
        }
    }

    /// Transition after the current attempt failed
    pub fn fail(self, policy: &RetryPolicy) -> Self {
        match self {
            Self::Attempt(n) if n < policy.max_attempts => Self::Retry(n),
            Self::Attempt(_) => Self::Exhausted,
            other => other,
        }
    }

    /// Leaves the retry state for the next attempt
    pub fn advance(self) -> Self {
        match self {
            Self::Retry(n) => Self::Attempt(n + 1),
            other => other,
        }
    }

    /// Number of the attempt in progress, if any
    pub fn attempt(&self) -> Option<u32> {
        match self {
            Self::Attempt(n) => Some(*n),
            _ => None,
        }
    }

    /// True for the attempts that follow a failure
    pub fn is_retry_attempt(&self) -> bool {
        matches!(self, Self::Attempt(n) if *n > 1)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Exhausted)
    }
}

//! Change detection
//!
//! Decides whether a fetched page needs to be written. Checks run cheapest
//! first and the first hit wins:
//!
//! | # | Condition | Result |
//! |---|-----------|--------|
//! | 1 | 304 Not Modified | unchanged, nothing hashed |
//! | 2 | Last-Modified equals the stored one | unchanged |
//! | 3 | Body hash equals the stored hash | unchanged, stored Last-Modified kept |
//! | 4 | otherwise | changed |

use crate::refresh::fetcher::{FetchedPage, PageBody};
use crate::state::UnchangedReason;
use crate::storage::FetchCandidate;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// What the database remembers about the last stored version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedSignals {
    /// 0 when never fetched or reset
    pub hash: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<&FetchCandidate> for CachedSignals {
    fn from(candidate: &FetchCandidate) -> Self {
        Self {
            hash: candidate.hash,
            last_modified: candidate.last_modified,
        }
    }
}

/// Verdict for one fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Unchanged(UnchangedReason),

    /// The body must be extracted and stored with these signals
    Changed {
        body: PageBody,
        hash: u64,
        last_modified: DateTime<Utc>,
    },
}

/// 64-bit content fingerprint: the first 8 bytes of the body's SHA-256
pub fn content_hash(body: &[u8]) -> u64 {
    let digest = Sha256::digest(body);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

pub fn detect(cached: &CachedSignals, page: FetchedPage) -> Detection {
    let (body, last_modified) = match page {
        FetchedPage::NotModified => return Detection::Unchanged(UnchangedReason::NotModified),
        FetchedPage::Body {
            body,
            last_modified,
        } => (body, last_modified),
    };

    if cached.last_modified == Some(last_modified) {
        return Detection::Unchanged(UnchangedReason::SameTimestamp);
    }

    let hash = content_hash(&body.bytes);
    if hash == cached.hash {
        return Detection::Unchanged(UnchangedReason::SameHash);
    }

    Detection::Changed {
        body,
        hash,
        last_modified,
    }
}

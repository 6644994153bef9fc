/// Per-item outcomes of a refresh run
///
/// Every candidate ends in exactly one of these. None of them aborts the run.
use std::fmt;

/// Why a fetched item did not need a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnchangedReason {
    /// Server answered 304 to the conditional request
    NotModified,

    /// Last-Modified equals the stored timestamp
    SameTimestamp,

    /// Body hashes to the stored content hash
    SameHash,
}

impl UnchangedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotModified => "not_modified",
            Self::SameTimestamp => "same_timestamp",
            Self::SameHash => "same_hash",
        }
    }
}

impl fmt::Display for UnchangedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal state of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemOutcome {
    // ===== Success States =====
    /// Fetched, nothing to write
    Unchanged(UnchangedReason),

    /// New content was extracted and written
    Changed,

    // ===== Error States =====
    /// Every attempt failed; the item keeps its stored content
    Exhausted,

    /// The body could not be turned into text
    ExtractFailed,

    /// The write of new content failed
    PersistFailed,
}

impl ItemOutcome {
    /// Returns true if the item was fetched successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Unchanged(_) | Self::Changed)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::Exhausted | Self::ExtractFailed | Self::PersistFailed
        )
    }

    /// Returns true if new content reached the database
    pub fn wrote_content(&self) -> bool {
        matches!(self, Self::Changed)
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unchanged(reason) => reason.as_str(),
            Self::Changed => "changed",
            Self::Exhausted => "exhausted",
            Self::ExtractFailed => "extract_failed",
            Self::PersistFailed => "persist_failed",
        }
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged(reason) => write!(f, "unchanged ({})", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}

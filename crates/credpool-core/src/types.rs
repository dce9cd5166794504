use clap::ValueEnum;
use serde::Serialize;

use crate::error::FormatRejection;

/// A credential chosen by the rotator, with its position in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub credential: String,
    pub index: usize,
}

/// Result of asking the pool manager to admit a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    /// Appended at the end of the pool and persisted.
    Added { index: usize },
    /// Exact match already in the pool; nothing changed.
    AlreadyPresent,
    /// Failed format validation; nothing changed.
    Rejected(FormatRejection),
    /// The pool could not be written; the stored pool is unchanged.
    StorageFailed,
}

impl AddOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added { .. })
    }
}

/// Result of removing a credential from the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoveOutcome {
    /// At least one entry was removed. `first_index` is where the first
    /// match sat before removal; `remaining` is the new pool size.
    Removed { first_index: usize, remaining: usize },
    NotFound,
    StorageFailed,
}

/// Per-credential snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub index: usize,
    pub masked: String,
    pub recent_usage: usize,
    pub throttled: bool,
    /// True when this credential is the next one the rotator will consider.
    pub next: bool,
}

/// Output format for CLI responses
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

//! Ordered, deduplicated credential pool with format checks on admission.

use credpool_config::FormatConfig;
use credpool_core::{AddOutcome, FormatRejection, RemoveOutcome};
use credpool_store::KeyValueStore;
use tracing::info;

/// Admission rules for new credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPolicy {
    pub min_length: usize,
    /// Empty disables the prefix check.
    pub required_prefix: String,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::from(&FormatConfig::default())
    }
}

impl From<&FormatConfig> for FormatPolicy {
    fn from(config: &FormatConfig) -> Self {
        Self {
            min_length: config.min_length,
            required_prefix: config.required_prefix.clone(),
        }
    }
}

impl FormatPolicy {
    /// Checks run in order: blank, length, prefix.
    pub fn validate(&self, candidate: &str) -> Result<(), FormatRejection> {
        if candidate.trim().is_empty() {
            return Err(FormatRejection::Empty);
        }

        let actual = candidate.chars().count();
        if actual < self.min_length {
            return Err(FormatRejection::TooShort {
                min: self.min_length,
                actual,
            });
        }

        if !self.required_prefix.is_empty() && !candidate.starts_with(&self.required_prefix) {
            return Err(FormatRejection::WrongPrefix {
                expected: self.required_prefix.clone(),
            });
        }

        Ok(())
    }
}

/// View over the persisted pool. Holds no cached copy: every call reads
/// the store, so separate managers over the same store agree.
#[derive(Debug, Clone)]
pub struct KeyPoolManager {
    store: KeyValueStore,
    policy: FormatPolicy,
}

impl KeyPoolManager {
    pub fn new(store: KeyValueStore, policy: FormatPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &FormatPolicy {
        &self.policy
    }

    pub fn validate_format(&self, candidate: &str) -> Result<(), FormatRejection> {
        self.policy.validate(candidate)
    }

    /// Admit `candidate` (surrounding whitespace ignored) at the end of the
    /// pool, so older entries keep their place in the rotation.
    pub fn add(&self, candidate: &str) -> AddOutcome {
        let candidate = candidate.trim();
        if let Err(rejection) = self.validate_format(candidate) {
            return AddOutcome::Rejected(rejection);
        }

        let mut pool = self.store.load();
        if pool.iter().any(|existing| existing == candidate) {
            return AddOutcome::AlreadyPresent;
        }

        pool.push(candidate.to_string());
        match self.store.save(&pool) {
            Ok(()) => {
                info!(credential = %mask(candidate), size = pool.len(), "Added credential");
                AddOutcome::Added {
                    index: pool.len() - 1,
                }
            }
            Err(_) => AddOutcome::StorageFailed,
        }
    }

    /// Remove every exact match of `candidate`.
    pub fn remove(&self, candidate: &str) -> RemoveOutcome {
        let pool = self.store.load();
        let Some(first_index) = pool.iter().position(|existing| existing == candidate) else {
            return RemoveOutcome::NotFound;
        };

        let remaining: Vec<String> = pool
            .into_iter()
            .filter(|existing| existing != candidate)
            .collect();

        match self.store.save(&remaining) {
            Ok(()) => {
                info!(
                    credential = %mask(candidate),
                    remaining = remaining.len(),
                    "Removed credential"
                );
                RemoveOutcome::Removed {
                    first_index,
                    remaining: remaining.len(),
                }
            }
            Err(_) => RemoveOutcome::StorageFailed,
        }
    }

    /// Current pool in rotation order.
    pub fn list(&self) -> Vec<String> {
        self.store.load()
    }
}

/// Display form: first 8 and last 4 characters around `****`.
/// Anything too short to keep a hidden middle is masked entirely.
pub fn mask(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

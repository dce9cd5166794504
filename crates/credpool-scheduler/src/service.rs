//! Single entry point tying the pool, rate tracker and rotator to one store.
//!
//! Typical request cycle:
//! 1. `get_next_credential()`; `None` means "wait or add a credential".
//! 2. Perform the external call with the returned credential.
//! 3. `record_usage(credential)` once the request has been dispatched.

use std::path::Path;
use std::sync::Arc;

use credpool_config::PoolConfig;
use credpool_core::{AddOutcome, CredentialStatus, FormatRejection, RemoveOutcome, Selection};
use credpool_store::{
    Cipher, FileBackend, KeyValueStore, PlainCipher, StaticKeyCipher, StoreError,
};
use tracing::info;

use crate::pool::{FormatPolicy, KeyPoolManager, mask};
use crate::rate_limit::{Clock, RateLimitPolicy, RateLimitTracker, SystemClock};
use crate::rotation::Rotator;

#[derive(Debug, Clone)]
pub struct CredentialService {
    store: KeyValueStore,
    pool: KeyPoolManager,
    tracker: RateLimitTracker,
    rotator: Rotator,
}

impl CredentialService {
    pub fn new(
        store: KeyValueStore,
        format: FormatPolicy,
        rate_limit: RateLimitPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pool = KeyPoolManager::new(store.clone(), format);
        let tracker = RateLimitTracker::new(store.clone(), clock, rate_limit);
        let rotator = Rotator::new(store.clone(), pool.clone(), tracker.clone());
        Self {
            store,
            pool,
            tracker,
            rotator,
        }
    }

    /// File-backed service in `state_dir`, using the config's policies and
    /// the system clock.
    pub fn open(state_dir: &Path, config: &PoolConfig) -> Self {
        let cipher: Arc<dyn Cipher> = if config.storage.encrypt {
            Arc::new(StaticKeyCipher::new())
        } else {
            Arc::new(PlainCipher)
        };
        let store = KeyValueStore::new(Arc::new(FileBackend::new(state_dir)), cipher);
        Self::new(
            store,
            FormatPolicy::from(&config.format),
            RateLimitPolicy::from(&config.rate_limit),
            Arc::new(SystemClock),
        )
    }

    /// Ephemeral service with default policies.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            KeyValueStore::in_memory(),
            FormatPolicy::default(),
            RateLimitPolicy::default(),
            clock,
        )
    }

    pub fn get_next_credential(&self) -> Option<String> {
        self.select().map(|selection| selection.credential)
    }

    /// Like [`Self::get_next_credential`], with the pool index.
    pub fn select(&self) -> Option<Selection> {
        self.rotator.select_next()
    }

    pub fn record_usage(&self, credential: &str) -> Result<(), StoreError> {
        self.tracker.record_usage(credential)
    }

    pub fn add_credential(&self, candidate: &str) -> AddOutcome {
        self.pool.add(candidate)
    }

    /// Remove a credential, keep the cursor valid and drop its history.
    pub fn remove_credential(&self, candidate: &str) -> RemoveOutcome {
        let outcome = self.pool.remove(candidate);
        if let RemoveOutcome::Removed {
            first_index,
            remaining,
        } = outcome
        {
            self.rotator.reclamp_after_removal(first_index, remaining);
            // Stale history only delays a re-added credential; failure is logged.
            self.tracker.forget(candidate).ok();
        }
        outcome
    }

    pub fn list_credentials(&self) -> Vec<String> {
        self.pool.list()
    }

    /// Delete the pool, cursor, usage history and any legacy record.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        info!("Cleared credential pool");
        Ok(())
    }

    pub fn validate_format(&self, candidate: &str) -> Result<(), FormatRejection> {
        self.pool.validate_format(candidate)
    }

    /// Per-credential usage and throttle state, in rotation order.
    pub fn status(&self) -> Vec<CredentialStatus> {
        let pool = self.pool.list();
        let cursor = self.rotator.cursor();
        let snapshot = self.tracker.snapshot();
        let single = pool.len() == 1;
        pool.iter()
            .enumerate()
            .map(|(index, credential)| CredentialStatus {
                index,
                masked: mask(credential),
                recent_usage: snapshot.recent_usage(credential),
                // A lone credential is never skipped by the rotator.
                throttled: !single && snapshot.is_throttled(credential),
                next: index == cursor,
            })
            .collect()
    }

    pub fn rate_limit(&self) -> &RateLimitPolicy {
        self.tracker.policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::ManualClock;
    use std::time::Duration;
    use tempfile::tempdir;

    const A: &str = "AIzaSyAAAAAAAAAAAAAAAAAAAAAA";
    const B: &str = "AIzaSyBBBBBBBBBBBBBBBBBBBBBB";
    const C: &str = "AIzaSyCCCCCCCCCCCCCCCCCCCCCC";

    fn make_service() -> (Arc<ManualClock>, CredentialService) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let service = CredentialService::in_memory(clock.clone());
        (clock, service)
    }

    #[test]
    fn test_request_cycle() {
        let (_, service) = make_service();
        assert!(service.get_next_credential().is_none());

        service.add_credential(A);
        service.add_credential(B);

        let first = service.get_next_credential().unwrap();
        service.record_usage(&first).unwrap();
        let second = service.get_next_credential().unwrap();
        service.record_usage(&second).unwrap();

        assert_eq!(first, A);
        assert_eq!(second, B);
    }

    #[test]
    fn test_remove_credential_reclamps_and_forgets() {
        let (_, service) = make_service();
        for key in [A, B, C] {
            service.add_credential(key);
        }
        service.record_usage(B).unwrap();
        // Advance cursor to 2 (next is C).
        service.get_next_credential();
        service.get_next_credential();

        assert!(matches!(
            service.remove_credential(A),
            RemoveOutcome::Removed { .. }
        ));
        assert_eq!(service.get_next_credential().as_deref(), Some(C));

        service.remove_credential(B);
        let status = service.status();
        assert_eq!(status.len(), 1);
        assert_eq!(service.list_credentials(), vec![C]);
    }

    #[test]
    fn test_removed_credential_history_is_dropped() {
        let (_, service) = make_service();
        service.add_credential(A);
        service.add_credential(B);
        for _ in 0..15 {
            service.record_usage(A).unwrap();
        }
        service.remove_credential(A);
        service.add_credential(A);
        assert_eq!(service.status()[1].recent_usage, 0);
    }

    #[test]
    fn test_status_reports_usage_and_next() {
        let (clock, service) = make_service();
        service.add_credential(A);
        service.add_credential(B);
        for _ in 0..15 {
            service.record_usage(A).unwrap();
        }
        service.record_usage(B).unwrap();

        let status = service.status();
        assert_eq!(status[0].recent_usage, 15);
        assert!(status[0].throttled);
        assert!(status[0].next);
        assert_eq!(status[1].recent_usage, 1);
        assert!(!status[1].throttled);
        assert_eq!(status[1].masked, "AIzaSyBB****BBBB");

        clock.advance(Duration::from_secs(60));
        assert!(service.status().iter().all(|s| s.recent_usage == 0));
    }

    #[test]
    fn test_status_single_credential_never_throttled() {
        let (_, service) = make_service();
        service.add_credential(A);
        for _ in 0..20 {
            service.record_usage(A).unwrap();
        }
        let status = service.status();
        assert_eq!(status[0].recent_usage, 20);
        assert!(!status[0].throttled);
    }

    #[test]
    fn test_clear_all() {
        let (_, service) = make_service();
        service.add_credential(A);
        service.record_usage(A).unwrap();
        service.clear_all().unwrap();
        assert!(service.list_credentials().is_empty());
        assert!(service.get_next_credential().is_none());
    }

    #[test]
    fn test_validate_format_passthrough() {
        let (_, service) = make_service();
        assert_eq!(service.validate_format(""), Err(FormatRejection::Empty));
        assert!(service.validate_format(A).is_ok());
    }

    #[test]
    fn test_open_persists_across_instances() {
        let temp = tempdir().unwrap();
        let config = PoolConfig::default();

        let first = CredentialService::open(temp.path(), &config);
        first.add_credential(A);
        first.add_credential(B);
        assert_eq!(first.get_next_credential().as_deref(), Some(A));

        let second = CredentialService::open(temp.path(), &config);
        assert_eq!(second.list_credentials(), vec![A, B]);
        assert_eq!(second.get_next_credential().as_deref(), Some(B));
    }

    #[test]
    fn test_open_without_encryption_stores_plain_pool() {
        let temp = tempdir().unwrap();
        let mut config = PoolConfig::default();
        config.storage.encrypt = false;

        let service = CredentialService::open(temp.path(), &config);
        service.add_credential(A);

        let raw = std::fs::read_to_string(temp.path().join("credpool.pool")).unwrap();
        assert!(raw.contains(A));
    }

    #[test]
    fn test_disabling_encryption_keeps_sealed_pool() {
        let temp = tempdir().unwrap();
        let sealed_config = PoolConfig::default();
        let mut plain_config = PoolConfig::default();
        plain_config.storage.encrypt = false;

        let sealed = CredentialService::open(temp.path(), &sealed_config);
        sealed.add_credential(A);
        sealed.add_credential(B);

        let plain = CredentialService::open(temp.path(), &plain_config);
        assert_eq!(plain.list_credentials(), vec![A, B]);
        plain.add_credential(C);

        let resealed = CredentialService::open(temp.path(), &sealed_config);
        assert_eq!(resealed.list_credentials(), vec![A, B, C]);
    }

    #[test]
    fn test_open_applies_config_policies() {
        let temp = tempdir().unwrap();
        let mut config = PoolConfig::default();
        config.rate_limit.max_requests = 1;
        config.format.required_prefix = "sk-".to_string();

        let service = CredentialService::open(temp.path(), &config);
        assert_eq!(service.rate_limit().max_requests, 1);
        assert!(service.validate_format(A).is_err());
        assert!(
            service
                .validate_format("sk-aaaaaaaaaaaaaaaaaaaaaa")
                .is_ok()
        );
    }
}

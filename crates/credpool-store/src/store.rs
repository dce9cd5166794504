use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{KvBackend, MemoryBackend};
use crate::cipher::{Cipher, StaticKeyCipher};

/// Millisecond usage timestamps per credential, oldest first.
pub type UsageHistory = BTreeMap<String, Vec<i64>>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0:#}")]
    Backend(#[from] anyhow::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to seal pool record: {0:#}")]
    Cipher(anyhow::Error),
}

/// Backend key names for the four logical records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Sealed JSON array of credentials.
    pub pool: String,
    /// Plain integer: next index the rotator considers.
    pub cursor: String,
    /// Plain JSON object: credential -> timestamps.
    pub usage: String,
    /// Pre-pool format holding a single bare credential.
    pub legacy_single: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            pool: "credpool.pool".to_string(),
            cursor: "credpool.cursor".to_string(),
            usage: "credpool.usage".to_string(),
            legacy_single: "credpool.legacy_key".to_string(),
        }
    }
}

impl StorageKeys {
    fn all(&self) -> [&str; 4] {
        [
            self.pool.as_str(),
            self.cursor.as_str(),
            self.legacy_single.as_str(),
            self.usage.as_str(),
        ]
    }
}

/// Typed access to the pool, cursor and usage records.
///
/// Reads never fail: unreadable records are logged and treated as absent.
/// Writes return [`StoreError`] and log it, so callers can degrade
/// gracefully instead of aborting whatever they were doing.
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn KvBackend>,
    cipher: Arc<dyn Cipher>,
    keys: StorageKeys,
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl KeyValueStore {
    pub fn new(backend: Arc<dyn KvBackend>, cipher: Arc<dyn Cipher>) -> Self {
        Self {
            backend,
            cipher,
            keys: StorageKeys::default(),
        }
    }

    /// Ephemeral store: in-memory backend, sealed pool record.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(StaticKeyCipher::new()),
        )
    }

    pub fn with_keys(mut self, keys: StorageKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Seal and persist the pool.
    pub fn save(&self, pool: &[String]) -> Result<(), StoreError> {
        self.write_pool(pool)
            .inspect_err(|e| warn!(error = %e, "Failed to save credential pool"))
    }

    /// Load the pool, migrating older on-disk formats on the way.
    ///
    /// Fallback chain: configured cipher → record sealed under the embedded
    /// key → plaintext JSON record (both re-saved in the configured form) →
    /// nothing. A legacy single-credential record is then folded
    /// into the pool and deleted once the merged pool is saved.
    pub fn load(&self) -> Vec<String> {
        let mut pool = match self.backend.get(&self.keys.pool) {
            Ok(Some(blob)) => self.decode_pool(&blob),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Failed to read credential pool");
                return Vec::new();
            }
        };

        self.migrate_legacy_single(&mut pool);
        pool
    }

    /// Delete every record this store owns.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in self.keys.all() {
            if let Err(e) = self.backend.delete(key) {
                warn!(key, error = %format!("{e:#}"), "Failed to delete record");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(StoreError::Backend(e)),
            None => Ok(()),
        }
    }

    /// Stored cursor; absent or corrupt reads as 0.
    pub fn load_cursor(&self) -> usize {
        match self.backend.get(&self.keys.cursor) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(raw = %raw, "Ignoring corrupt rotation cursor");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Failed to read rotation cursor");
                0
            }
        }
    }

    pub fn save_cursor(&self, cursor: usize) -> Result<(), StoreError> {
        self.backend
            .set(&self.keys.cursor, &cursor.to_string())
            .map_err(StoreError::from)
            .inspect_err(|e| warn!(error = %e, "Failed to save rotation cursor"))
    }

    /// Stored usage history; absent or corrupt reads as empty.
    pub fn load_usage(&self) -> UsageHistory {
        match self.backend.get(&self.keys.usage) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring corrupt usage history");
                UsageHistory::new()
            }),
            Ok(None) => UsageHistory::new(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Failed to read usage history");
                UsageHistory::new()
            }
        }
    }

    pub fn save_usage(&self, usage: &UsageHistory) -> Result<(), StoreError> {
        let write = || -> Result<(), StoreError> {
            let json = serde_json::to_string(usage)?;
            self.backend.set(&self.keys.usage, &json)?;
            Ok(())
        };
        write().inspect_err(|e| warn!(error = %e, "Failed to save usage history"))
    }

    pub fn clear_usage(&self) -> Result<(), StoreError> {
        self.backend
            .delete(&self.keys.usage)
            .map_err(StoreError::from)
            .inspect_err(|e| warn!(error = %e, "Failed to clear usage history"))
    }

    fn write_pool(&self, pool: &[String]) -> Result<(), StoreError> {
        let json = serde_json::to_string(pool)?;
        let sealed = self
            .cipher
            .seal(json.as_bytes())
            .map_err(StoreError::Cipher)?;
        self.backend.set(&self.keys.pool, &sealed)?;
        Ok(())
    }

    fn decode_pool(&self, blob: &str) -> Vec<String> {
        if let Some(pool) = open_pool(self.cipher.as_ref(), blob) {
            return normalize(pool);
        }

        // Sealed while encryption was on; readable whatever the current cipher.
        if let Some(pool) = open_pool(&StaticKeyCipher::new(), blob) {
            let pool = normalize(pool);
            info!(count = pool.len(), "Re-saving sealed credential pool in configured form");
            // save() logs its own failure; the decoded pool is still usable.
            self.save(&pool).ok();
            return pool;
        }

        match serde_json::from_str::<Vec<String>>(blob) {
            Ok(pool) => {
                let pool = normalize(pool);
                info!(count = pool.len(), "Migrating plaintext credential pool");
                // Overwrites the plaintext remnant in place. save() logs failures.
                self.save(&pool).ok();
                pool
            }
            Err(_) => {
                warn!("Credential pool record is unreadable; treating pool as empty");
                Vec::new()
            }
        }
    }

    fn migrate_legacy_single(&self, pool: &mut Vec<String>) {
        let legacy = match self.backend.get(&self.keys.legacy_single) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Failed to read legacy credential");
                return;
            }
        };

        let legacy = legacy.trim();
        if !legacy.is_empty() && !pool.iter().any(|c| c == legacy) {
            pool.push(legacy.to_string());
            if self.save(pool).is_err() {
                // Keep the legacy record so the next load can retry.
                return;
            }
        }

        info!("Migrated legacy single credential into pool");
        if let Err(e) = self.backend.delete(&self.keys.legacy_single) {
            warn!(error = %format!("{e:#}"), "Failed to delete legacy credential record");
        }
    }
}

fn open_pool(cipher: &dyn Cipher, blob: &str) -> Option<Vec<String>> {
    let bytes = cipher.open(blob).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Drop blank entries and duplicates, keeping first-seen order.
fn normalize(pool: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(pool.len());
    for credential in pool {
        if !credential.trim().is_empty() && !out.contains(&credential) {
            out.push(credential);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FileBackend;
    use crate::cipher::PlainCipher;
    use tempfile::tempdir;

    fn make_store() -> (Arc<MemoryBackend>, KeyValueStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = KeyValueStore::new(backend.clone(), Arc::new(StaticKeyCipher::new()));
        (backend, store)
    }

    fn pool(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Backend whose writes always fail.
    struct ReadOnlyBackend(MemoryBackend);

    impl KvBackend for ReadOnlyBackend {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.get(key)
        }
        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("quota exceeded")
        }
        fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.0.delete(key)
        }
    }

    #[test]
    fn test_save_load_preserves_order() {
        let (_, store) = make_store();
        let original = pool(&["AIzaSyC", "AIzaSyA", "AIzaSyB"]);
        store.save(&original).unwrap();
        assert_eq!(store.load(), original);
    }

    #[test]
    fn test_pool_record_is_not_plaintext() {
        let (backend, store) = make_store();
        store.save(&pool(&["AIzaSySecretValue"])).unwrap();
        let raw = backend.get("credpool.pool").unwrap().unwrap();
        assert!(!raw.contains("AIzaSySecretValue"));
    }

    #[test]
    fn test_roundtrip_across_sessions_with_file_backend() {
        let temp = tempdir().unwrap();
        let original = pool(&["AIzaSyFirstKeyXXXXXXXX", "AIzaSySecondKeyXXXXXXX"]);

        let first = KeyValueStore::new(
            Arc::new(FileBackend::new(temp.path())),
            Arc::new(StaticKeyCipher::new()),
        );
        first.save(&original).unwrap();
        drop(first);

        let second = KeyValueStore::new(
            Arc::new(FileBackend::new(temp.path())),
            Arc::new(StaticKeyCipher::new()),
        );
        assert_eq!(second.load(), original);
    }

    #[test]
    fn test_load_empty_store() {
        let (_, store) = make_store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_migrates_plaintext_pool() {
        let (backend, store) = make_store();
        backend
            .set("credpool.pool", r#"["AIzaSyLegacyA","AIzaSyLegacyB"]"#)
            .unwrap();

        assert_eq!(store.load(), pool(&["AIzaSyLegacyA", "AIzaSyLegacyB"]));

        let raw = backend.get("credpool.pool").unwrap().unwrap();
        assert!(!raw.contains("AIzaSyLegacyA"), "pool should be re-sealed");
        assert_eq!(store.load(), pool(&["AIzaSyLegacyA", "AIzaSyLegacyB"]));
    }

    #[test]
    fn test_sealed_pool_survives_switch_to_plain() {
        let backend = Arc::new(MemoryBackend::new());
        let sealed = KeyValueStore::new(backend.clone(), Arc::new(StaticKeyCipher::new()));
        sealed.save(&pool(&["AIzaSyA", "AIzaSyB"])).unwrap();

        let plain = KeyValueStore::new(backend.clone(), Arc::new(PlainCipher));
        assert_eq!(plain.load(), pool(&["AIzaSyA", "AIzaSyB"]));
        // Re-saved in the configured (plain) form.
        assert_eq!(
            backend.get("credpool.pool").unwrap().as_deref(),
            Some(r#"["AIzaSyA","AIzaSyB"]"#)
        );

        let mut grown = plain.load();
        grown.push("AIzaSyC".to_string());
        plain.save(&grown).unwrap();
        assert_eq!(sealed.load(), pool(&["AIzaSyA", "AIzaSyB", "AIzaSyC"]));
    }

    #[test]
    fn test_load_garbage_is_empty() {
        let (backend, store) = make_store();
        backend.set("credpool.pool", "not json, not sealed").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_legacy_single_key_migration() {
        let (backend, store) = make_store();
        backend
            .set("credpool.legacy_key", "AIzaSyOnlyKeyXXXXXXXXXX")
            .unwrap();

        assert_eq!(store.load(), pool(&["AIzaSyOnlyKeyXXXXXXXXXX"]));
        assert!(backend.get("credpool.legacy_key").unwrap().is_none());
        // Persisted in the pool record, not just returned.
        assert_eq!(store.load(), pool(&["AIzaSyOnlyKeyXXXXXXXXXX"]));
    }

    #[test]
    fn test_legacy_single_key_merged_without_duplicate() {
        let (backend, store) = make_store();
        store.save(&pool(&["AIzaSyA", "AIzaSyB"])).unwrap();
        backend.set("credpool.legacy_key", "AIzaSyA").unwrap();

        assert_eq!(store.load(), pool(&["AIzaSyA", "AIzaSyB"]));
        assert!(backend.get("credpool.legacy_key").unwrap().is_none());
    }

    #[test]
    fn test_blank_legacy_record_is_dropped() {
        let (backend, store) = make_store();
        backend.set("credpool.legacy_key", "   ").unwrap();
        assert!(store.load().is_empty());
        assert!(backend.get("credpool.legacy_key").unwrap().is_none());
    }

    #[test]
    fn test_legacy_record_kept_when_save_fails() {
        let inner = MemoryBackend::new();
        inner.set("credpool.legacy_key", "AIzaSyOnlyKey").unwrap();
        let backend = Arc::new(ReadOnlyBackend(inner));
        let store = KeyValueStore::new(backend.clone(), Arc::new(StaticKeyCipher::new()));

        assert_eq!(store.load(), pool(&["AIzaSyOnlyKey"]));
        assert!(backend.get("credpool.legacy_key").unwrap().is_some());
    }

    #[test]
    fn test_save_failure_is_returned_not_panicked() {
        let store = KeyValueStore::new(
            Arc::new(ReadOnlyBackend(MemoryBackend::new())),
            Arc::new(StaticKeyCipher::new()),
        );
        let err = store.save(&pool(&["AIzaSyA"])).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_load_dedupes_stored_pool() {
        let (backend, store) = make_store();
        backend
            .set("credpool.pool", r#"["AIzaSyA","AIzaSyB","AIzaSyA",""]"#)
            .unwrap();
        assert_eq!(store.load(), pool(&["AIzaSyA", "AIzaSyB"]));
    }

    #[test]
    fn test_clear_removes_all_records() {
        let (backend, store) = make_store();
        store.save(&pool(&["AIzaSyA"])).unwrap();
        store.save_cursor(1).unwrap();
        let mut usage = UsageHistory::new();
        usage.insert("AIzaSyA".into(), vec![1, 2]);
        store.save_usage(&usage).unwrap();
        backend.set("credpool.legacy_key", "AIzaSyOld").unwrap();

        store.clear().unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_cursor_roundtrip_and_corruption() {
        let (backend, store) = make_store();
        assert_eq!(store.load_cursor(), 0);
        store.save_cursor(4).unwrap();
        assert_eq!(store.load_cursor(), 4);
        assert_eq!(backend.get("credpool.cursor").unwrap().as_deref(), Some("4"));

        backend.set("credpool.cursor", "minus one").unwrap();
        assert_eq!(store.load_cursor(), 0);
    }

    #[test]
    fn test_usage_roundtrip_is_plain_json() {
        let (backend, store) = make_store();
        let mut usage = UsageHistory::new();
        usage.insert("AIzaSyA".into(), vec![1_000, 2_000]);
        store.save_usage(&usage).unwrap();

        assert_eq!(store.load_usage(), usage);
        let raw = backend.get("credpool.usage").unwrap().unwrap();
        assert_eq!(raw, r#"{"AIzaSyA":[1000,2000]}"#);

        store.clear_usage().unwrap();
        assert!(store.load_usage().is_empty());
    }

    #[test]
    fn test_corrupt_usage_reads_empty() {
        let (backend, store) = make_store();
        backend.set("credpool.usage", "{not json").unwrap();
        assert!(store.load_usage().is_empty());
    }

    #[test]
    fn test_custom_keys() {
        let backend = Arc::new(MemoryBackend::new());
        let store = KeyValueStore::new(backend.clone(), Arc::new(PlainCipher)).with_keys(
            StorageKeys {
                pool: "p".into(),
                cursor: "c".into(),
                usage: "u".into(),
                legacy_single: "l".into(),
            },
        );
        store.save(&pool(&["AIzaSyA"])).unwrap();
        assert_eq!(backend.get("p").unwrap().as_deref(), Some(r#"["AIzaSyA"]"#));
        assert_eq!(store.keys().cursor, "c");
    }
}

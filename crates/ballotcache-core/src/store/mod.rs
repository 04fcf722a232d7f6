//! Persistent key-value storage shared by every component.
//!
//! A [`Store`] wraps a single [`KvMedium`] (a JSON file on disk, or memory in
//! tests) and hands out namespaced views. Each namespace enforces its own key
//! prefix so the response cache, the canonical dataset and the admin auth
//! records never step on each other's keys.

pub mod medium;

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use medium::{FileMedium, MemoryMedium};

/// Prefix reserved for cached API responses.
pub const CACHE_PREFIX: &str = "api_cache_";

/// Prefix reserved for admin users and sessions.
pub const AUTH_PREFIX: &str = "admin_";

/// Canonical election dataset written by the sync service.
pub const ELECTION_DATA_KEY: &str = "stored_election_data";

/// ISO-8601 time of the last successful dataset refresh.
pub const LAST_UPDATE_KEY: &str = "last_data_update";

/// ISO-8601 time of the last response cache invalidation.
pub const LAST_SYNC_KEY: &str = "last_api_sync";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// A flat string-to-string persistent medium, in the manner of browser
/// local storage.
pub trait KvMedium: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Every key and value, read in one pass.
    fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut out = Vec::new();
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    /// Remove several keys as one write. Either all are removed or none.
    fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Shared handle to the storage medium.
/// Clone is cheap; all clones see the same medium.
#[derive(Clone)]
pub struct Store {
    medium: Arc<dyn KvMedium>,
}

impl Store {
    pub fn new(medium: Arc<dyn KvMedium>) -> Self {
        Self { medium }
    }

    /// A store backed by memory only, used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryMedium::new()))
    }

    /// Namespace holding cached API responses.
    pub fn cache(&self) -> Namespace {
        Namespace::new(self.clone(), CACHE_PREFIX)
    }

    /// Namespace holding admin users and the active session.
    pub fn auth(&self) -> Namespace {
        Namespace::new(self.clone(), AUTH_PREFIX)
    }

    /// Well-known dataset keys, outside any prefix.
    pub fn dataset(&self) -> DatasetSlots {
        DatasetSlots {
            store: self.clone(),
        }
    }

    fn medium(&self) -> &dyn KvMedium {
        self.medium.as_ref()
    }
}

/// A view over every key that starts with one prefix.
#[derive(Clone)]
pub struct Namespace {
    store: Store,
    prefix: &'static str,
}

impl Namespace {
    fn new(store: Store, prefix: &'static str) -> Self {
        Self { store, prefix }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store.medium().get(&self.full_key(key))
    }

    pub fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.medium().set(&self.full_key(key), value)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.store.medium().remove(&self.full_key(key))
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let contents = serde_json::to_string(value)?;
        self.set_raw(key, &contents)
    }

    /// Keys in this namespace with the prefix stripped, optionally narrowed
    /// to those starting with `filter`.
    pub fn keys(&self, filter: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .medium()
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(self.prefix).map(String::from))
            .filter(|k| k.starts_with(filter))
            .collect())
    }

    /// Remove every key in this namespace starting with `filter`.
    /// Returns how many keys were removed.
    pub fn clear(&self, filter: &str) -> Result<usize, StoreError> {
        let doomed: Vec<String> = self
            .keys(filter)?
            .iter()
            .map(|key| self.full_key(key))
            .collect();
        if !doomed.is_empty() {
            self.store.medium().remove_many(&doomed)?;
        }
        Ok(doomed.len())
    }

    /// Total bytes held by this namespace, keys included.
    pub fn size_bytes(&self) -> Result<usize, StoreError> {
        Ok(self
            .store
            .medium()
            .entries()?
            .iter()
            .filter(|(k, _)| k.starts_with(self.prefix))
            .map(|(k, v)| k.len() + v.len())
            .sum())
    }
}

/// Accessors for the canonical dataset and its timestamps.
#[derive(Clone)]
pub struct DatasetSlots {
    store: Store,
}

impl DatasetSlots {
    pub fn get<T: DeserializeOwned>(&self, key: DatasetKey) -> Result<Option<T>, StoreError> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_raw(&self, key: DatasetKey) -> Result<Option<String>, StoreError> {
        self.store.medium().get(key.as_str())
    }

    pub fn set_raw(&self, key: DatasetKey, value: &str) -> Result<(), StoreError> {
        self.store.medium().set(key.as_str(), value)
    }

    pub fn remove(&self, key: DatasetKey) -> Result<(), StoreError> {
        self.store.medium().remove(key.as_str())
    }

    /// Put back a value captured earlier with `get_raw`, removing the key if
    /// it did not exist then.
    pub fn restore(&self, key: DatasetKey, previous: Option<&str>) -> Result<(), StoreError> {
        match previous {
            Some(value) => self.set_raw(key, value),
            None => self.remove(key),
        }
    }
}

/// The fixed keys owned by the sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKey {
    Elections,
    LastUpdate,
    LastSync,
}

impl DatasetKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKey::Elections => ELECTION_DATA_KEY,
            DatasetKey::LastUpdate => LAST_UPDATE_KEY,
            DatasetKey::LastSync => LAST_SYNC_KEY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory medium that counts the calls reaching it.
    #[derive(Default)]
    struct CountingMedium {
        inner: MemoryMedium,
        removes: AtomicUsize,
        batch_removes: AtomicUsize,
        gets: AtomicUsize,
    }

    impl KvMedium for CountingMedium {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            self.inner.remove(key)
        }
        fn keys(&self) -> Result<Vec<String>, StoreError> {
            self.inner.keys()
        }
        fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
            self.inner.entries()
        }
        fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
            self.batch_removes.fetch_add(1, Ordering::SeqCst);
            self.inner.remove_many(keys)
        }
    }

    #[test]
    fn test_namespaces_do_not_overlap() {
        let store = Store::in_memory();
        store.cache().set_raw("x", "1").unwrap();
        store.auth().set_raw("x", "2").unwrap();
        store.dataset().set_raw(DatasetKey::LastUpdate, "now").unwrap();

        assert_eq!(store.cache().get_raw("x").unwrap().as_deref(), Some("1"));
        assert_eq!(store.auth().get_raw("x").unwrap().as_deref(), Some("2"));
        assert_eq!(store.cache().keys("").unwrap(), vec!["x".to_string()]);
    }

    #[test]
    fn test_clear_only_touches_own_prefix() {
        let store = Store::in_memory();
        store.cache().set_raw("/a?x=1", "1").unwrap();
        store.cache().set_raw("/b?x=1", "1").unwrap();
        store.auth().set_raw("users", "[]").unwrap();
        store.dataset().set_raw(DatasetKey::Elections, "{}").unwrap();

        assert_eq!(store.cache().clear("/a").unwrap(), 1);
        assert_eq!(store.cache().keys("").unwrap(), vec!["/b?x=1".to_string()]);

        assert_eq!(store.cache().clear("").unwrap(), 1);
        assert!(store.cache().keys("").unwrap().is_empty());
        assert!(store.auth().get_raw("users").unwrap().is_some());
        assert!(store.dataset().get_raw(DatasetKey::Elections).unwrap().is_some());
    }

    #[test]
    fn test_restore_removes_keys_that_did_not_exist() {
        let store = Store::in_memory();
        let slots = store.dataset();
        slots.set_raw(DatasetKey::LastSync, "later").unwrap();
        slots.restore(DatasetKey::LastSync, None).unwrap();
        assert!(slots.get_raw(DatasetKey::LastSync).unwrap().is_none());

        slots.restore(DatasetKey::LastSync, Some("earlier")).unwrap();
        assert_eq!(
            slots.get_raw(DatasetKey::LastSync).unwrap().as_deref(),
            Some("earlier")
        );
    }

    #[test]
    fn test_clear_removes_in_one_batch() {
        let medium = Arc::new(CountingMedium::default());
        let store = Store::new(medium.clone());
        for i in 0..50 {
            store.cache().set_raw(&format!("/e{}", i), "payload").unwrap();
        }
        store.auth().set_raw("users", "[]").unwrap();

        assert_eq!(store.cache().clear("").unwrap(), 50);
        assert_eq!(medium.batch_removes.load(Ordering::SeqCst), 1);
        assert_eq!(medium.removes.load(Ordering::SeqCst), 0);
        assert!(store.cache().keys("").unwrap().is_empty());
        assert!(store.auth().get_raw("users").unwrap().is_some());

        assert_eq!(store.cache().clear("").unwrap(), 0);
        assert_eq!(medium.batch_removes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_size_bytes_reads_one_snapshot() {
        let medium = Arc::new(CountingMedium::default());
        let store = Store::new(medium.clone());
        for i in 0..20 {
            store.cache().set_raw(&format!("k{}", i), "v").unwrap();
        }
        store.cache().size_bytes().unwrap();
        assert_eq!(medium.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_size_bytes_counts_keys_and_values() {
        let store = Store::in_memory();
        store.cache().set_raw("k", "vv").unwrap();
        assert_eq!(store.cache().size_bytes().unwrap(), CACHE_PREFIX.len() + 1 + 2);
    }
}

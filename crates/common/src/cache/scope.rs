//! Scoped views over the key/value store
//!
//! A scope is a path prefix plus a shared store reference. Reads and writes
//! address `scope-path + key`; child scopes extend the prefix. Writes fail
//! soft: caching is best-effort and a storage fault must never abort the
//! operation that wanted to cache something.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::store::KvStore;
use super::KeyPath;
use crate::error::Result;

/// One entry yielded by [`CacheScope::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Key path relative to the scope that produced it
    pub key: KeyPath,
    /// Raw JSON value; callers deserialize through their own schema
    pub value: serde_json::Value,
}

/// A namespaced view of the cache rooted at a path prefix.
///
/// Cloning a scope, or deriving children via [`CacheScope::scope`], shares
/// the same underlying store; only the prefix differs. A scope can never
/// read or write entries outside its prefix.
#[derive(Debug, Clone)]
pub struct CacheScope {
    store: Arc<KvStore>,
    path: KeyPath,
}

impl CacheScope {
    /// Root scope over `store`.
    #[must_use]
    pub fn root(store: Arc<KvStore>) -> Self {
        Self { store, path: KeyPath::default() }
    }

    /// Child view rooted at `scope-path + key`.
    #[must_use]
    pub fn scope(&self, key: impl Into<KeyPath>) -> CacheScope {
        Self { store: Arc::clone(&self.store), path: self.path.join(&key.into()) }
    }

    /// Path prefix this scope is rooted at.
    #[must_use]
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// Read and deserialize an entry. Absent or expired entries are `None`.
    ///
    /// # Errors
    /// `Storage` on store faults, `Serialization` if the stored document
    /// does not match `T`'s schema, `InvalidInput` on a malformed key.
    pub async fn get<T: DeserializeOwned>(&self, key: impl Into<KeyPath>) -> Result<Option<T>> {
        let encoded = self.path.join(&key.into()).encode()?;
        let handle = self.store.open()?;
        match handle.get(&encoded)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Read an entry, falling back to `default` when absent, expired, or
    /// unreadable for any reason.
    pub async fn get_or<T: DeserializeOwned>(&self, key: impl Into<KeyPath>, default: T) -> T {
        match self.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                warn!(error = %err, "cache read failed, using default");
                default
            }
        }
    }

    /// Write an entry, optionally expiring after `ttl`.
    ///
    /// Returns `false` instead of an error when the write fails; cache
    /// writes never abort their caller.
    pub async fn set<T: Serialize>(
        &self,
        key: impl Into<KeyPath>,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let result = (|| -> Result<()> {
            let encoded = self.path.join(&key.into()).encode()?;
            let raw = serde_json::to_string(value)?;
            let ttl_ms = ttl.map(|d| d.as_millis().min(i64::MAX as u128) as i64);
            let handle = self.store.open()?;
            handle.set(&encoded, &raw, ttl_ms)
        })();

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "cache write failed");
                false
            }
        }
    }

    /// Remove the given entries under this scope.
    ///
    /// # Errors
    /// `Storage` on store faults, `InvalidInput` on a malformed key.
    pub async fn delete(&self, keys: impl IntoIterator<Item = KeyPath>) -> Result<()> {
        let handle = self.store.open()?;
        for key in keys {
            let encoded = self.path.join(&key).encode()?;
            handle.delete(&encoded)?;
        }
        Ok(())
    }

    /// Remove the entire subtree rooted at this scope.
    ///
    /// # Errors
    /// `Storage` on store faults.
    pub async fn clear(&self) -> Result<()> {
        let handle = self.store.open()?;
        handle.delete_prefix(&self.path.encode()?)?;
        Ok(())
    }

    /// Enumerate entries under `scope-path + prefix`.
    ///
    /// The returned iterator is finite and consuming; keys come back
    /// relative to this scope. Re-invoke to enumerate again.
    ///
    /// # Errors
    /// `Storage` on store faults, `InvalidInput` on a malformed prefix.
    pub async fn list(
        &self,
        prefix: impl Into<KeyPath>,
    ) -> Result<impl Iterator<Item = CacheEntry>> {
        let full_prefix = self.path.join(&prefix.into());
        let scope_len = self.path.segments().len();
        let handle = self.store.open()?;
        let rows = handle.list_prefix(&full_prefix.encode()?)?;

        Ok(rows.into_iter().filter_map(move |(encoded, raw)| {
            let absolute = KeyPath::decode(&encoded);
            let relative = KeyPath(absolute.segments().get(scope_len..)?.to_vec());
            let value = serde_json::from_str(&raw).ok()?;
            Some(CacheEntry { key: relative, value })
        }))
    }

    /// Enumerate just the relative keys under `scope-path + prefix`.
    ///
    /// # Errors
    /// Same conditions as [`CacheScope::list`].
    pub async fn keys(&self, prefix: impl Into<KeyPath>) -> Result<Vec<KeyPath>> {
        Ok(self.list(prefix).await?.map(|entry| entry.key).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Marker {
        id: u32,
    }

    fn temp_scope() -> (TempDir, CacheScope) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(KvStore::new(dir.path(), false).unwrap());
        (dir, CacheScope::root(store))
    }

    #[tokio::test]
    async fn set_get_round_trip() {
        let (_dir, root) = temp_scope();
        assert!(root.set("m", &Marker { id: 1 }, None).await);
        assert_eq!(root.get::<Marker>("m").await.unwrap(), Some(Marker { id: 1 }));
    }

    #[tokio::test]
    async fn expired_entry_yields_default() {
        let (_dir, root) = temp_scope();
        assert!(root.set("m", &Marker { id: 1 }, Some(Duration::from_millis(20))).await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        let fallback = Marker { id: 0 };
        assert_eq!(root.get_or("m", fallback.clone()).await, fallback);
    }

    #[tokio::test]
    async fn sibling_scopes_are_isolated() {
        let (_dir, root) = temp_scope();
        let a = root.scope("a");
        let b = root.scope("b");

        assert!(a.set("key", &Marker { id: 7 }, None).await);
        assert_eq!(b.get::<Marker>("key").await.unwrap(), None);
        assert_eq!(root.get::<Marker>("key").await.unwrap(), None);
        assert_eq!(a.get::<Marker>("key").await.unwrap(), Some(Marker { id: 7 }));
    }

    #[tokio::test]
    async fn clear_removes_only_the_subtree() {
        let (_dir, root) = temp_scope();
        let session = root.scope("session");
        let other = root.scope("other");

        assert!(session.set("auth", &Marker { id: 1 }, None).await);
        assert!(session.scope("nested").set("deep", &Marker { id: 2 }, None).await);
        assert!(other.set("auth", &Marker { id: 3 }, None).await);

        session.clear().await.unwrap();
        assert_eq!(session.get::<Marker>("auth").await.unwrap(), None);
        assert_eq!(session.scope("nested").get::<Marker>("deep").await.unwrap(), None);
        assert_eq!(other.get::<Marker>("auth").await.unwrap(), Some(Marker { id: 3 }));
    }

    #[tokio::test]
    async fn list_returns_relative_keys() {
        let (_dir, root) = temp_scope();
        let scope = root.scope("s");
        assert!(scope.set("a", &Marker { id: 1 }, None).await);
        assert!(scope.set(["group", "b"], &Marker { id: 2 }, None).await);

        let keys = scope.keys(KeyPath::default()).await.unwrap();
        assert_eq!(keys, vec![KeyPath::from("a"), KeyPath::from(["group", "b"])]);

        let grouped: Vec<CacheEntry> = scope.list("group").await.unwrap().collect();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].key, KeyPath::from(["group", "b"]));
    }

    #[tokio::test]
    async fn schema_mismatch_surfaces_serialization_error() {
        let (_dir, root) = temp_scope();
        assert!(root.set("m", &"just a string", None).await);
        let read = root.get::<Marker>("m").await;
        assert!(read.is_err());
    }

    #[tokio::test]
    async fn write_to_a_broken_store_reports_false() {
        // Point the store below an existing file so the directory can
        // never be created.
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = KvStore::new(blocker.join("sub"), false).unwrap();
        let root = CacheScope::root(Arc::new(store));

        assert!(!root.set("k", &Marker { id: 1 }, None).await);
    }

    #[tokio::test]
    async fn delete_removes_named_entries() {
        let (_dir, root) = temp_scope();
        assert!(root.set("a", &Marker { id: 1 }, None).await);
        assert!(root.set("b", &Marker { id: 2 }, None).await);

        root.delete([KeyPath::from("a")]).await.unwrap();
        assert_eq!(root.get::<Marker>("a").await.unwrap(), None);
        assert_eq!(root.get::<Marker>("b").await.unwrap(), Some(Marker { id: 2 }));
    }
}

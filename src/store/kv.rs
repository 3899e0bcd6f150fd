use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::{Key, Namespace, StoreError};

/// Store-wide stamp assigned to every committed mutation.
/// Strictly increasing, so a key's version changes on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(pub u64);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:020}", self.0)
    }
}

/// A stored value together with the version it was written at
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: Value,
    pub version: Version,
}

#[derive(Debug, Clone)]
pub enum Mutation {
    Set(Key, Value),
    Delete(Key),
}

/// All-or-nothing write conditioned on the observed versions of a key group.
///
/// A check of `None` requires the key to be absent at commit time.
#[derive(Debug, Clone, Default)]
pub struct AtomicWrite {
    pub checks: Vec<(Key, Option<Version>)>,
    pub mutations: Vec<Mutation>,
}

impl AtomicWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(mut self, key: Key, expected: Option<Version>) -> Self {
        self.checks.push((key, expected));
        self
    }

    pub fn set(mut self, key: Key, value: Value) -> Self {
        self.mutations.push(Mutation::Set(key, value));
        self
    }

    pub fn delete(mut self, key: Key) -> Self {
        self.mutations.push(Mutation::Delete(key));
        self
    }
}

/// Trait for the key-value backend underneath the season store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &Key) -> Result<Option<Entry>, StoreError>;

    /// Lists every entry in a namespace, ordered by key
    async fn list(&self, namespace: Namespace) -> Result<Vec<(Key, Entry)>, StoreError>;

    /// Applies the write iff every check still holds. Returns the version
    /// stamped on the mutated keys.
    async fn commit(&self, write: AtomicWrite) -> Result<Version, StoreError>;
}

struct InMemoryState {
    entries: BTreeMap<Key, Entry>,
    next_version: u64,
}

/// In-memory implementation of KeyValueStore for development and testing
///
/// Data lives behind a single mutex, so every commit is trivially atomic
/// and serializable. Data is lost when the application restarts.
pub struct InMemoryKvStore {
    state: Mutex<InMemoryState>,
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InMemoryState {
                entries: BTreeMap::new(),
                next_version: 1,
            }),
        }
    }

    /// Returns the current number of entries in a namespace
    pub fn count(&self, namespace: Namespace) -> usize {
        self.state
            .lock()
            .unwrap()
            .entries
            .keys()
            .filter(|key| key.namespace == namespace)
            .count()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        let state = self.state.lock().unwrap();
        let entry = state.entries.get(key).cloned();
        debug!(found = entry.is_some(), "Read key from memory");
        Ok(entry)
    }

    #[instrument(skip(self))]
    async fn list(&self, namespace: Namespace) -> Result<Vec<(Key, Entry)>, StoreError> {
        let state = self.state.lock().unwrap();
        let entries: Vec<(Key, Entry)> = state
            .entries
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        debug!(count = entries.len(), "Listed namespace from memory");
        Ok(entries)
    }

    #[instrument(skip(self, write), fields(checks = write.checks.len(), mutations = write.mutations.len()))]
    async fn commit(&self, write: AtomicWrite) -> Result<Version, StoreError> {
        let mut state = self.state.lock().unwrap();

        for (key, expected) in &write.checks {
            let actual = state.entries.get(key).map(|entry| entry.version);
            if actual != *expected {
                warn!(key = %key, ?expected, ?actual, "Atomic check failed");
                return Err(StoreError::Conflict(format!("{} changed since it was read", key)));
            }
        }

        let version = Version(state.next_version);
        state.next_version += 1;

        for mutation in write.mutations {
            match mutation {
                Mutation::Set(key, value) => {
                    state.entries.insert(key, Entry { value, version });
                }
                Mutation::Delete(key) => {
                    state.entries.remove(&key);
                }
            }
        }

        debug!(%version, "Atomic write committed in memory");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn commit_sets_and_versions_keys() {
        let store = InMemoryKvStore::new();
        let key = Key::player("alice");

        let version = store
            .commit(AtomicWrite::new().check(key.clone(), None).set(key.clone(), json!({"a": 1})))
            .await
            .unwrap();

        let entry = store.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.version, version);
        assert_eq!(entry.value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn failed_check_applies_nothing() {
        let store = InMemoryKvStore::new();
        let season = Key::season("s1");
        let pointer = Key::latest_season();

        store
            .commit(AtomicWrite::new().set(pointer.clone(), json!("s0")))
            .await
            .unwrap();

        // Pointer check expects absence but the pointer exists
        let result = store
            .commit(
                AtomicWrite::new()
                    .check(season.clone(), None)
                    .check(pointer.clone(), None)
                    .set(season.clone(), json!({}))
                    .set(pointer.clone(), json!("s1")),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(store.get(&season).await.unwrap().is_none());
        assert_eq!(store.get(&pointer).await.unwrap().unwrap().value, json!("s0"));
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = InMemoryKvStore::new();
        let key = Key::season("s1");

        let first = store
            .commit(AtomicWrite::new().set(key.clone(), json!(1)))
            .await
            .unwrap();
        store
            .commit(AtomicWrite::new().check(key.clone(), Some(first)).set(key.clone(), json!(2)))
            .await
            .unwrap();

        let result = store
            .commit(AtomicWrite::new().check(key.clone(), Some(first)).set(key.clone(), json!(3)))
            .await;
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(store.get(&key).await.unwrap().unwrap().value, json!(2));
    }

    #[tokio::test]
    async fn list_is_scoped_to_namespace() {
        let store = InMemoryKvStore::new();
        store
            .commit(
                AtomicWrite::new()
                    .set(Key::player("b"), json!(2))
                    .set(Key::player("a"), json!(1))
                    .set(Key::season("s"), json!(3)),
            )
            .await
            .unwrap();

        let players = store.list(Namespace::Players).await.unwrap();
        let ids: Vec<_> = players.iter().map(|(key, _)| key.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.count(Namespace::Seasons), 1);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = InMemoryKvStore::new();
        let key = Key::player("alice");
        store.commit(AtomicWrite::new().set(key.clone(), json!(1))).await.unwrap();
        store.commit(AtomicWrite::new().delete(key.clone())).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }
}

use async_trait::async_trait;
use std::sync::Arc;

use lc_dailies::store::{
    AtomicWrite, Entry, InMemoryKvStore, Key, KeyValueStore, Namespace, StoreError, Version,
};

/// In-memory store that yields to the scheduler before every operation,
/// so futures joined on one task interleave between read and commit.
pub struct YieldingKvStore {
    inner: Arc<InMemoryKvStore>,
}

impl YieldingKvStore {
    pub fn new(inner: Arc<InMemoryKvStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl KeyValueStore for YieldingKvStore {
    async fn get(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(key).await
    }

    async fn list(&self, namespace: Namespace) -> Result<Vec<(Key, Entry)>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.list(namespace).await
    }

    async fn commit(&self, write: AtomicWrite) -> Result<Version, StoreError> {
        tokio::task::yield_now().await;
        self.inner.commit(write).await
    }
}

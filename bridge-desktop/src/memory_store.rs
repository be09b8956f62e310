//! Process-memory key-value store

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{PersistentStore, StoreKind},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::trace;

/// In-memory store.
///
/// Contents live exactly as long as the value, which makes it the native
/// analogue of a tab-scoped store. Also used as a persistent store in tests
/// by sharing one instance between contexts.
///
/// Writes can be refused on demand with [`MemoryStore::set_read_only`] to
/// reproduce a full or locked medium.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    kind: StoreKind,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_kind(StoreKind::Persistent)
    }

    /// A store reporting itself as tab-scoped.
    pub fn tab_scoped() -> Self {
        Self::with_kind(StoreKind::TabScoped)
    }

    pub fn with_kind(kind: StoreKind) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            kind,
            read_only: AtomicBool::new(false),
        }
    }

    /// Refuse (or accept again) every write and removal.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(BridgeError::StorageUnavailable(format!(
                "{} memory store is read-only",
                self.kind
            )));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        trace!(key = key, kind = %self.kind, "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.entries.write().await.remove(key);
        trace!(key = key, kind = %self.kind, "Removed value");
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        self.kind
    }
}

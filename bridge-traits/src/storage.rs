//! Persistent Key-Value Storage Abstraction
//!
//! Provides a uniform asynchronous get/set/remove interface over whichever
//! persistent medium the host provides:
//! - Web: `localStorage` (persistent) and `sessionStorage` (tab-scoped)
//! - Mobile: the platform's asynchronous key-value store
//! - Desktop: SQLite-backed key-value table or process memory
//!
//! Browser storage is synchronous, but it is still exposed through this
//! async-shaped API so that callers always await regardless of host.

use crate::{error::Result, platform::PlatformSendSync};
use std::fmt;

/// Scope of a store's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Survives restarts and is shared by every execution context of the
    /// same origin/profile.
    Persistent,
    /// Lives only as long as the current execution context (one tab).
    TabScoped,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Persistent => f.write_str("persistent"),
            StoreKind::TabScoped => f.write_str("tab_scoped"),
        }
    }
}

/// Persistent key-value store trait
///
/// # Contract
///
/// - `get` returns `Ok(None)` for an absent key; absence is never an error.
/// - `set` overwrites unconditionally and fails with
///   [`BridgeError::StorageUnavailable`](crate::error::BridgeError::StorageUnavailable)
///   when the medium refuses the write (quota, permissions, privacy mode).
/// - `remove` is idempotent: removing an absent key succeeds.
/// - `remove_many` is best-effort: every key is attempted even after a
///   failure, and keys already removed stay removed.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::PersistentStore;
///
/// async fn remember_theme(store: &dyn PersistentStore) -> Result<()> {
///     store.set("theme", "dark").await?;
///     assert_eq!(store.get("theme").await?, Some("dark".to_string()));
///     Ok(())
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait PersistentStore: PlatformSendSync {
    /// Retrieve the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` if present
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove several keys, continuing past failures
    ///
    /// Returns the first error encountered, after every key was attempted.
    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(err) = self.remove(key).await {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Scope of this store
    fn kind(&self) -> StoreKind {
        StoreKind::Persistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use mockall::mock;

    mock! {
        pub Store {}

        #[async_trait::async_trait]
        impl PersistentStore for Store {
            async fn get(&self, key: &str) -> Result<Option<String>>;
            async fn set(&self, key: &str, value: &str) -> Result<()>;
            async fn remove(&self, key: &str) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn test_remove_many_attempts_every_key() {
        let mut store = MockStore::new();
        store
            .expect_remove()
            .withf(|key: &str| key == "a")
            .times(1)
            .returning(|_| Err(BridgeError::StorageUnavailable("locked".to_string())));
        store
            .expect_remove()
            .withf(|key: &str| key == "b")
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_remove()
            .withf(|key: &str| key == "c")
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("second".to_string())));

        let result = store.remove_many(&["a", "b", "c"]).await;

        // First failure is reported
        assert!(matches!(result, Err(BridgeError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_remove_many_succeeds_when_all_succeed() {
        let mut store = MockStore::new();
        store.expect_remove().times(2).returning(|_| Ok(()));

        assert!(store.remove_many(&["a", "b"]).await.is_ok());
    }

    #[test]
    fn test_default_kind_is_persistent() {
        let store = MockStore::new();
        assert_eq!(store.kind(), StoreKind::Persistent);
        assert_eq!(StoreKind::TabScoped.to_string(), "tab_scoped");
    }
}

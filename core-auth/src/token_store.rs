//! Session Record Storage
//!
//! Persists the [`TokenRecord`] as one JSON value in the primary store and,
//! on hosts with tab-scoped storage, mirrors the bare access token into the
//! tab-scoped store.
//!
//! ## Guarantees
//!
//! - The record is written and removed under a single key, so other readers
//!   never observe a half-written session
//! - Token values are never logged; only fingerprints
//! - The primary store is authoritative: a mirror failure is logged and
//!   does not fail the operation
//! - A corrupted record is erased on read and reported as absent
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{TokenRecord, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::PersistentStore;
//! # async fn example(local: Arc<dyn PersistentStore>, tab: Arc<dyn PersistentStore>) -> core_auth::Result<()> {
//! let store = TokenStore::new(local, Some(tab), "shared_token:session", "shared_token:access_token");
//!
//! let record = TokenRecord::new("abc.def.ghi", None, None, 1_700_000_000_000)?;
//! store.write(&record).await?;
//! assert!(store.read_record().await?.is_some());
//!
//! store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::types::TokenRecord;
use bridge_traits::PersistentStore;
use core_runtime::logging::token_fingerprint;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage of one context's session record.
#[derive(Clone)]
pub struct TokenStore {
    primary: Arc<dyn PersistentStore>,
    tab_store: Option<Arc<dyn PersistentStore>>,
    session_key: String,
    mirror_key: String,
}

impl TokenStore {
    pub fn new(
        primary: Arc<dyn PersistentStore>,
        tab_store: Option<Arc<dyn PersistentStore>>,
        session_key: impl Into<String>,
        mirror_key: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            tab_store,
            session_key: session_key.into(),
            mirror_key: mirror_key.into(),
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn mirror_key(&self) -> &str {
        &self.mirror_key
    }

    /// Read the session record from the primary store.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` if a readable record exists
    /// - `Ok(None)` if no record exists, or the stored one was corrupted
    ///   (it is erased)
    /// - `Err` if the primary store cannot be read
    pub async fn read_record(&self) -> Result<Option<TokenRecord>> {
        let Some(raw) = self.primary.get(&self.session_key).await.map_err(|e| {
            warn!(key = %self.session_key, error = %e, "Failed to read session record");
            e
        })?
        else {
            return Ok(None);
        };

        match TokenRecord::from_json(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(
                    key = %self.session_key,
                    error = %e,
                    "Session record is corrupted, erasing it"
                );
                if let Err(remove_err) = self.primary.remove(&self.session_key).await {
                    warn!(error = %remove_err, "Failed to erase corrupted session record");
                }
                Ok(None)
            }
        }
    }

    /// Access token mirrored in the tab-scoped store, if any.
    pub async fn read_mirror(&self) -> Result<Option<String>> {
        let Some(tab_store) = &self.tab_store else {
            return Ok(None);
        };

        let token = tab_store.get(&self.mirror_key).await?;
        Ok(token.filter(|t| !t.trim().is_empty()))
    }

    /// Persist `record`, replacing any previous session.
    ///
    /// # Errors
    ///
    /// Fails only when the primary store rejects the write.
    pub async fn write(&self, record: &TokenRecord) -> Result<()> {
        let json = record.to_json()?;

        self.primary
            .set(&self.session_key, &json)
            .await
            .map_err(|e| {
                warn!(
                    key = %self.session_key,
                    error = %e,
                    "Failed to write session record"
                );
                e
            })?;

        self.write_mirror(&record.access_token).await;

        info!(
            token = %token_fingerprint(&record.access_token),
            has_profile = record.user_profile.is_some(),
            has_refresh_token = record.refresh_token.is_some(),
            "Session record stored"
        );

        Ok(())
    }

    /// Copy `access_token` into the tab-scoped store. Failures are logged
    /// and otherwise ignored.
    pub async fn write_mirror(&self, access_token: &str) {
        let Some(tab_store) = &self.tab_store else {
            return;
        };

        if let Err(e) = tab_store.set(&self.mirror_key, access_token).await {
            warn!(
                key = %self.mirror_key,
                error = %e,
                "Failed to mirror access token into tab-scoped store"
            );
        }
    }

    /// Remove every key the bridge owns from every store.
    ///
    /// All removals are attempted even after a failure; the first failure
    /// is returned. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        let keys = [self.session_key.as_str(), self.mirror_key.as_str()];

        let primary = self.primary.remove_many(&keys).await;
        if let Err(e) = &primary {
            warn!(error = %e, "Failed to clear session keys from primary store");
        }

        let tab = match &self.tab_store {
            Some(tab_store) => tab_store.remove_many(&keys).await,
            None => Ok(()),
        };
        if let Err(e) = &tab {
            warn!(error = %e, "Failed to clear session keys from tab-scoped store");
        }

        primary?;
        tab?;

        debug!("Session keys cleared");
        Ok(())
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("primary", &self.primary.kind())
            .field("tab_store", &self.tab_store.as_ref().map(|s| s.kind()))
            .field("session_key", &self.session_key)
            .field("mirror_key", &self.mirror_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::types::{UserId, UserProfile};
    use bridge_desktop::MemoryStore;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;

    mock! {
        Store {}

        #[async_trait::async_trait]
        impl PersistentStore for Store {
            async fn get(&self, key: &str) -> BridgeResult<Option<String>>;
            async fn set(&self, key: &str, value: &str) -> BridgeResult<()>;
            async fn remove(&self, key: &str) -> BridgeResult<()>;
        }
    }

    const SESSION: &str = "shared_token:session";
    const MIRROR: &str = "shared_token:access_token";

    fn record() -> TokenRecord {
        TokenRecord::new(
            "abc.def.ghi",
            Some(UserProfile::new(UserId::Number(1), "Ana")),
            Some("ref-1".to_string()),
            1_000,
        )
        .unwrap()
    }

    fn stores() -> (Arc<MemoryStore>, Arc<MemoryStore>, TokenStore) {
        let primary = Arc::new(MemoryStore::new());
        let tab = Arc::new(MemoryStore::tab_scoped());
        let store = TokenStore::new(primary.clone(), Some(tab.clone()), SESSION, MIRROR);
        (primary, tab, store)
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let (_, tab, store) = stores();

        store.write(&record()).await.unwrap();

        assert_eq!(store.read_record().await.unwrap(), Some(record()));
        assert_eq!(store.read_mirror().await.unwrap().as_deref(), Some("abc.def.ghi"));
        assert_eq!(tab.get(MIRROR).await.unwrap().as_deref(), Some("abc.def.ghi"));
    }

    #[tokio::test]
    async fn test_corrupted_record_is_erased() {
        let (primary, _, store) = stores();
        primary.set(SESSION, "{not json").await.unwrap();

        assert_eq!(store.read_record().await.unwrap(), None);
        assert_eq!(primary.get(SESSION).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_removes_everything_and_is_idempotent() {
        let (primary, tab, store) = stores();
        store.write(&record()).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert!(primary.is_empty().await);
        assert!(tab.is_empty().await);
    }

    #[tokio::test]
    async fn test_mirror_failure_is_not_fatal() {
        let (primary, tab, store) = stores();
        tab.set_read_only(true);

        store.write(&record()).await.unwrap();

        assert!(primary.get(SESSION).await.unwrap().is_some());
        assert_eq!(store.read_mirror().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_primary_failure_is_reported() {
        let mut primary = MockStore::new();
        primary
            .expect_set()
            .returning(|_, _| Err(BridgeError::StorageUnavailable("quota exceeded".into())));

        let store = TokenStore::new(Arc::new(primary), None, SESSION, MIRROR);

        assert!(matches!(
            store.write(&record()).await,
            Err(AuthError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_attempts_every_store() {
        let mut primary = MockStore::new();
        primary
            .expect_remove()
            .times(2)
            .returning(|_| Err(BridgeError::StorageUnavailable("locked".into())));

        let tab = Arc::new(MemoryStore::tab_scoped());
        tab.set(MIRROR, "abc.def.ghi").await.unwrap();

        let store = TokenStore::new(Arc::new(primary), Some(tab.clone()), SESSION, MIRROR);

        assert!(store.clear().await.is_err());
        assert!(tab.is_empty().await);
    }

    #[tokio::test]
    async fn test_write_mirror_replaces_previous_token() {
        let primary = Arc::new(MemoryStore::new());
        let tab = Arc::new(MemoryStore::tab_scoped());
        let store = TokenStore::new(primary.clone(), Some(tab.clone()), SESSION, MIRROR);
        store.write(&record()).await.unwrap();

        store.write_mirror("newtok").await;

        assert_eq!(tab.get(MIRROR).await.unwrap().as_deref(), Some("newtok"));
        assert_eq!(store.read_record().await.unwrap(), Some(record()));
    }

    #[tokio::test]
    async fn test_no_tab_store_means_no_mirror() {
        let store = TokenStore::new(Arc::new(MemoryStore::new()), None, SESSION, MIRROR);
        store.write(&record()).await.unwrap();

        assert_eq!(store.read_mirror().await.unwrap(), None);
    }
}

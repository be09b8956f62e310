//! Web Storage implementation of the persistent store bridge.
//!
//! `localStorage` holds the session record and survives restarts; it is
//! shared by every tab of the origin. `sessionStorage` is tab-scoped and
//! receives the access-token mirror. Both are synchronous browser APIs
//! exposed through the async [`PersistentStore`] trait.

use crate::error::WasmError;
use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    storage::{PersistentStore, StoreKind},
};
use tracing::trace;

fn window() -> BridgeResult<web_sys::Window> {
    web_sys::window().ok_or_else(|| BridgeError::NotAvailable("window".into()))
}

fn storage_error(context: &str, err: wasm_bindgen::JsValue) -> BridgeError {
    let bridge_error: BridgeError = WasmError::from(err).into();
    match bridge_error {
        BridgeError::OperationFailed(msg) => {
            BridgeError::OperationFailed(format!("web storage {}: {}", context, msg))
        }
        other => other,
    }
}

#[derive(Clone)]
/// Browser storage backed [`PersistentStore`].
pub struct WebStorageStore {
    storage: web_sys::Storage,
    kind: StoreKind,
}

impl WebStorageStore {
    /// `localStorage` of the current window.
    pub fn local() -> BridgeResult<Self> {
        let storage = window()?
            .local_storage()
            .map_err(|err| storage_error("localStorage", err))?
            .ok_or_else(|| BridgeError::NotAvailable("localStorage".into()))?;

        Ok(Self {
            storage,
            kind: StoreKind::Persistent,
        })
    }

    /// `sessionStorage` of the current window.
    pub fn session() -> BridgeResult<Self> {
        let storage = window()?
            .session_storage()
            .map_err(|err| storage_error("sessionStorage", err))?
            .ok_or_else(|| BridgeError::NotAvailable("sessionStorage".into()))?;

        Ok(Self {
            storage,
            kind: StoreKind::TabScoped,
        })
    }
}

#[async_trait(?Send)]
impl PersistentStore for WebStorageStore {
    async fn get(&self, key: &str) -> BridgeResult<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|err| storage_error("get_item", err))
    }

    async fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.storage.set_item(key, value).map_err(|err| {
            // Private browsing and full quotas both land here
            match storage_error("set_item", err) {
                BridgeError::OperationFailed(msg) => BridgeError::StorageUnavailable(msg),
                other => other,
            }
        })?;
        trace!(key = key, kind = %self.kind, "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> BridgeResult<()> {
        self.storage
            .remove_item(key)
            .map_err(|err| storage_error("remove_item", err))
    }

    fn kind(&self) -> StoreKind {
        self.kind
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    fn unique_key(prefix: &str) -> String {
        format!("{prefix}-{}", js_sys::Date::now())
    }

    #[wasm_bindgen_test]
    async fn local_store_roundtrip() {
        console_error_panic_hook::set_once();
        let store = WebStorageStore::local().expect("localStorage");
        let key = unique_key("local");

        store.set(&key, "value").await.expect("set");
        assert_eq!(store.get(&key).await.expect("get").as_deref(), Some("value"));

        store.remove(&key).await.expect("remove");
        store.remove(&key).await.expect("remove twice");
        assert_eq!(store.get(&key).await.expect("get"), None);
        assert_eq!(store.kind(), StoreKind::Persistent);
    }

    #[wasm_bindgen_test]
    async fn session_store_is_tab_scoped() {
        let store = WebStorageStore::session().expect("sessionStorage");
        let key = unique_key("session");

        store.set(&key, "token").await.expect("set");
        assert_eq!(store.get(&key).await.expect("get").as_deref(), Some("token"));
        assert_eq!(store.kind(), StoreKind::TabScoped);

        store.remove_many(&[key.as_str()]).await.expect("remove_many");
        assert_eq!(store.get(&key).await.expect("get"), None);
    }
}

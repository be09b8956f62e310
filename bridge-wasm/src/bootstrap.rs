//! Convenience helpers for wiring the browser bridge implementations together.
//!
//! Host shells use [`build_web_bridges`] to construct the stores and the best
//! available notifier for the current browser without writing repetitive glue
//! code. The result mirrors the role that the `bridge-desktop` crate plays for
//! native targets.

use std::sync::Arc;

use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    notify::{CrossContextNotifier, NoopNotifier, StoredValueDecoder},
    storage::PersistentStore,
};
use tracing::{info, warn};
use wasm_bindgen::JsValue;

use crate::{
    broadcast::{BroadcastChannelNotifier, StorageEventNotifier},
    storage::WebStorageStore,
};

/// Configuration for [`build_web_bridges`].
#[derive(Debug, Clone)]
pub struct WebBridgeConfig {
    /// Name of the `BroadcastChannel` shared by every tab of the app.
    pub channel_name: String,
    /// Key of the session record, watched by the `storage` event fallback.
    pub record_key: String,
}

impl WebBridgeConfig {
    /// Create a config for `channel_name`, watching `record_key`.
    pub fn new(channel_name: impl Into<String>, record_key: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            record_key: record_key.into(),
        }
    }
}

/// Browser adapters ready for injection into the core.
pub struct WebBridgeSet {
    /// `localStorage`, holding the session record.
    pub primary_store: Arc<dyn PersistentStore>,
    /// `sessionStorage`, holding the access-token mirror.
    pub tab_store: Option<Arc<dyn PersistentStore>>,
    /// Best notifier this browser supports.
    pub notifier: Arc<dyn CrossContextNotifier>,
}

/// Build the browser bridge stack.
///
/// `localStorage` is required. A missing `sessionStorage` only disables the
/// mirror, and a browser without any cross-tab mechanism gets a
/// [`NoopNotifier`].
pub fn build_web_bridges(
    config: &WebBridgeConfig,
    decoder: StoredValueDecoder,
) -> BridgeResult<WebBridgeSet> {
    let primary_store: Arc<dyn PersistentStore> = Arc::new(WebStorageStore::local()?);

    let tab_store: Option<Arc<dyn PersistentStore>> = match WebStorageStore::session() {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!(error = %e, "sessionStorage unavailable, access token will not be mirrored");
            None
        }
    };

    let notifier = best_notifier(config, decoder);
    info!(transport = %notifier.transport(), "Browser bridges ready");

    Ok(WebBridgeSet {
        primary_store,
        tab_store,
        notifier,
    })
}

/// `BroadcastChannel` when supported, else `storage` events, else nothing.
pub fn best_notifier(
    config: &WebBridgeConfig,
    decoder: StoredValueDecoder,
) -> Arc<dyn CrossContextNotifier> {
    match BroadcastChannelNotifier::new(&config.channel_name) {
        Ok(notifier) => return Arc::new(notifier),
        Err(e) => warn!(error = %e, "BroadcastChannel unsupported, falling back to storage events"),
    }

    match StorageEventNotifier::new(&config.record_key, decoder) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            warn!(error = %e, "No cross-tab transport available");
            Arc::new(NoopNotifier)
        }
    }
}

fn window() -> BridgeResult<web_sys::Window> {
    web_sys::window().ok_or_else(|| BridgeError::NotAvailable("window".into()))
}

/// `location.href` of the current window.
pub fn current_url() -> BridgeResult<String> {
    window()?
        .location()
        .href()
        .map_err(|err| BridgeError::OperationFailed(format!("location.href: {:?}", err)))
}

/// `navigator.userAgent` of the current window.
pub fn user_agent() -> BridgeResult<String> {
    window()?
        .navigator()
        .user_agent()
        .map_err(|err| BridgeError::OperationFailed(format!("navigator.userAgent: {:?}", err)))
}

/// Put `url` in the address bar without navigating or adding history.
pub fn replace_url(url: &str) -> BridgeResult<()> {
    window()?
        .history()
        .map_err(|err| BridgeError::NotAvailable(format!("history: {:?}", err)))?
        .replace_state_with_url(&JsValue::NULL, "", Some(url))
        .map_err(|err| BridgeError::OperationFailed(format!("history.replaceState: {:?}", err)))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use bridge_traits::notify::NotifierTransport;
    use wasm_bindgen_test::*;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn builds_full_stack_in_browser() {
        let config = WebBridgeConfig::new("bootstrap-test", "bootstrap-test:session");
        let set = build_web_bridges(&config, Arc::new(|_: &str| None)).expect("bridges");

        assert!(set.tab_store.is_some());
        assert_eq!(set.notifier.transport(), NotifierTransport::BroadcastChannel);
    }

    #[wasm_bindgen_test]
    fn replace_url_keeps_origin() {
        let before = current_url().expect("href");
        replace_url(&before).expect("replaceState");
        assert_eq!(current_url().expect("href"), before);
        assert!(!user_agent().expect("user agent").is_empty());
    }
}

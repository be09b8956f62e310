//! # Bridge Configuration Module
//!
//! Builder for the configuration of one context's session bridge.
//!
//! ## Overview
//!
//! The builder collects the host capabilities (stores, notifier, clock) and
//! the bridge settings, and validates everything before any bridge exists.
//! Nothing is resolved lazily at first use: a missing store or a malformed
//! hand-off URL is reported by [`BridgeConfigBuilder::build`].
//!
//! ## Required Dependencies
//!
//! - `PersistentStore` (primary) - Holds the session record
//!
//! ## Optional Dependencies
//!
//! - Tab-scoped `PersistentStore` - Access-token mirror (expected on the Web host)
//! - `CrossContextNotifier` - Defaults to [`NoopNotifier`]
//! - `Clock` - Defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::BridgeConfig;
//! use std::sync::Arc;
//!
//! let config = BridgeConfig::builder()
//!     .primary_store(Arc::new(local_storage))
//!     .tab_store(Arc::new(session_storage))
//!     .notifier(Arc::new(broadcast_notifier))
//!     .web_app_url("https://portal.example.com")
//!     .mobile_app_url("https://m.portal.example.com")
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::BridgeConfig;
//!
//! // No primary store: fails with Error::CapabilityMissing
//! let config = BridgeConfig::builder()
//!     .namespace("portal")
//!     .build()
//!     .expect("Should fail - missing primary store");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, CrossContextNotifier, HostPlatform, NoopNotifier, PersistentStore, SystemClock,
};
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "shared_token";

/// Upper bound for the expiry leeway.
pub const MAX_EXPIRY_LEEWAY_SECS: u64 = 300;

/// Upper bound for the local event bus buffer.
pub const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// Configuration of one context's session bridge.
///
/// Use [`BridgeConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Persistent store holding the session record (required)
    pub primary_store: Arc<dyn PersistentStore>,

    /// Tab-scoped store receiving the access-token mirror
    pub tab_store: Option<Arc<dyn PersistentStore>>,

    /// Transport to the other contexts
    pub notifier: Arc<dyn CrossContextNotifier>,

    pub clock: Arc<dyn Clock>,

    pub host: HostPlatform,

    /// Prefix of every key the bridge owns
    pub namespace: String,

    /// Base URL of the web deployment, for hand-off links
    pub web_app_url: Option<String>,

    /// Base URL of the mobile deployment, for hand-off links
    pub mobile_app_url: Option<String>,

    /// Grace period after `exp` before a token counts as expired
    pub expiry_leeway_secs: u64,

    /// Buffer size of the local event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("primary_store", &self.primary_store.kind())
            .field("tab_store", &self.tab_store.as_ref().map(|s| s.kind()))
            .field("notifier", &self.notifier.transport())
            .field("host", &self.host)
            .field("namespace", &self.namespace)
            .field("web_app_url", &self.web_app_url)
            .field("mobile_app_url", &self.mobile_app_url)
            .field("expiry_leeway_secs", &self.expiry_leeway_secs)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Key of the JSON session record in the primary store.
    pub fn session_key(&self) -> String {
        session_key_for(&self.namespace)
    }

    /// Key of the access-token mirror in the tab-scoped store.
    pub fn mirror_key(&self) -> String {
        mirror_key_for(&self.namespace)
    }

    /// Validates the configuration.
    ///
    /// Checks the namespace, the leeway and buffer bounds, and that hand-off
    /// targets are absolute http(s) URLs.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::Config("Namespace cannot be empty".to_string()));
        }

        if self.namespace.contains(':') {
            return Err(Error::Config(format!(
                "Namespace '{}' must not contain ':'",
                self.namespace
            )));
        }

        if self.expiry_leeway_secs > MAX_EXPIRY_LEEWAY_SECS {
            return Err(Error::Config(format!(
                "Expiry leeway exceeds maximum of {} seconds",
                MAX_EXPIRY_LEEWAY_SECS
            )));
        }

        if self.event_buffer_size == 0 || self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size must be between 1 and {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        if let Some(url) = &self.web_app_url {
            validate_base_url("web_app_url", url)?;
        }
        if let Some(url) = &self.mobile_app_url {
            validate_base_url("mobile_app_url", url)?;
        }

        Ok(())
    }
}

/// Record key for `namespace`, for adapters wired before the config exists.
pub fn session_key_for(namespace: &str) -> String {
    format!("{}:session", namespace)
}

pub fn mirror_key_for(namespace: &str) -> String {
    format!("{}:access_token", namespace)
}

fn validate_base_url(field: &str, value: &str) -> Result<()> {
    let parsed = Url::parse(value)
        .map_err(|e| Error::Config(format!("{} '{}' is not a valid URL: {}", field, value, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::Config(format!(
            "{} must use http or https, got '{}'",
            field, scheme
        ))),
    }
}

fn primary_store_missing_error() -> Error {
    Error::capability_missing(
        "PersistentStore",
        "A primary PersistentStore is required to hold the session record. \
         Desktop: use bridge_desktop::SqliteStore. \
         Web: use bridge_wasm::WebStorageStore::local(). \
         Mobile: inject the platform's asynchronous key-value store.",
    )
}

/// Builder for [`BridgeConfig`].
#[derive(Default)]
pub struct BridgeConfigBuilder {
    primary_store: Option<Arc<dyn PersistentStore>>,
    tab_store: Option<Arc<dyn PersistentStore>>,
    notifier: Option<Arc<dyn CrossContextNotifier>>,
    clock: Option<Arc<dyn Clock>>,
    host: Option<HostPlatform>,
    namespace: Option<String>,
    web_app_url: Option<String>,
    mobile_app_url: Option<String>,
    expiry_leeway_secs: Option<u64>,
    event_buffer_size: Option<usize>,
}

impl BridgeConfigBuilder {
    /// Sets the persistent store holding the session record (required).
    pub fn primary_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.primary_store = Some(store);
        self
    }

    /// Sets the tab-scoped store used for the access-token mirror.
    pub fn tab_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.tab_store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn CrossContextNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the detected host.
    pub fn host(mut self, host: HostPlatform) -> Self {
        self.host = Some(host);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn web_app_url(mut self, url: impl Into<String>) -> Self {
        self.web_app_url = Some(url.into());
        self
    }

    pub fn mobile_app_url(mut self, url: impl Into<String>) -> Self {
        self.mobile_app_url = Some(url.into());
        self
    }

    pub fn expiry_leeway_secs(mut self, secs: u64) -> Self {
        self.expiry_leeway_secs = Some(secs);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] without a primary store
    /// - [`Error::Config`] when a setting is out of range or malformed
    pub fn build(self) -> Result<BridgeConfig> {
        let primary_store = self
            .primary_store
            .ok_or_else(primary_store_missing_error)?;

        let host = self.host.unwrap_or_else(HostPlatform::detect);
        if host.has_tab_scoped_storage() && self.tab_store.is_none() {
            warn!(
                host = %host,
                "No tab-scoped store configured; the access token will not be mirrored"
            );
        }

        let config = BridgeConfig {
            primary_store,
            tab_store: self.tab_store,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            host,
            namespace: self
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            web_app_url: self.web_app_url,
            mobile_app_url: self.mobile_app_url,
            expiry_leeway_secs: self.expiry_leeway_secs.unwrap_or(0),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{error::Result as BridgeResult, NotifierTransport};
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

    fn store() -> Arc<dyn PersistentStore> {
        Arc::new(MockStore::new())
    }

    #[test]
    fn test_builder_requires_primary_store() {
        let err = BridgeConfig::builder().build().unwrap_err();

        assert!(matches!(err, Error::CapabilityMissing { .. }));
        assert!(err.to_string().contains("PersistentStore"));
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::builder()
            .primary_store(store())
            .host(HostPlatform::Desktop)
            .build()
            .unwrap();

        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.session_key(), "shared_token:session");
        assert_eq!(config.mirror_key(), "shared_token:access_token");
        assert_eq!(config.expiry_leeway_secs, 0);
        assert_eq!(config.event_buffer_size, 100);
        assert!(config.tab_store.is_none());
        assert_eq!(config.notifier.transport(), NotifierTransport::None);
        assert!(config.clock.unix_timestamp() > 0);
    }

    #[test]
    fn test_custom_namespace_keys() {
        let config = BridgeConfig::builder()
            .primary_store(store())
            .namespace("portal")
            .build()
            .unwrap();

        assert_eq!(config.session_key(), "portal:session");
        assert_eq!(config.mirror_key(), "portal:access_token");
    }

    #[test]
    fn test_rejects_bad_namespace() {
        for namespace in ["", "  ", "a:b"] {
            let result = BridgeConfig::builder()
                .primary_store(store())
                .namespace(namespace)
                .build();
            assert!(matches!(result, Err(Error::Config(_))), "{:?}", namespace);
        }
    }

    #[test]
    fn test_rejects_excessive_leeway() {
        let result = BridgeConfig::builder()
            .primary_store(store())
            .expiry_leeway_secs(MAX_EXPIRY_LEEWAY_SECS + 1)
            .build();
        assert!(result.unwrap_err().to_string().contains("leeway"));

        let ok = BridgeConfig::builder()
            .primary_store(store())
            .expiry_leeway_secs(MAX_EXPIRY_LEEWAY_SECS)
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_rejects_zero_buffer() {
        let result = BridgeConfig::builder()
            .primary_store(store())
            .event_buffer_size(0)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validates_handoff_urls() {
        let ok = BridgeConfig::builder()
            .primary_store(store())
            .web_app_url("https://portal.example.com")
            .mobile_app_url("http://localhost:3001")
            .build();
        assert!(ok.is_ok());

        let relative = BridgeConfig::builder()
            .primary_store(store())
            .web_app_url("/portal")
            .build();
        assert!(relative.unwrap_err().to_string().contains("web_app_url"));

        let wrong_scheme = BridgeConfig::builder()
            .primary_store(store())
            .mobile_app_url("ftp://files.example.com")
            .build();
        assert!(wrong_scheme.unwrap_err().to_string().contains("http or https"));
    }

    #[test]
    fn test_debug_lists_capabilities() {
        let config = BridgeConfig::builder()
            .primary_store(store())
            .tab_store(store())
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(rendered.contains("primary_store: Persistent"));
        assert!(rendered.contains("notifier: None"));
    }
}

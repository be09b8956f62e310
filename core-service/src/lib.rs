//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (persistent stores,
//! cross-context notifier, clock) into the session bridge and runs the boot
//! sequence every execution context performs on load. Desktop apps typically
//! enable the `desktop-shims` feature (which depends on `bridge-desktop`),
//! whereas WebAssembly builds enable the `wasm` feature and rely on the
//! adapters from `bridge-wasm`.
//!
//! ## Boot sequence
//!
//! 1. Load the persisted session
//! 2. Consume a session handed over in the page URL, and compute the URL
//!    without the session parameters
//! 3. Expire a stale session
//! 4. Start following the other contexts

pub mod error;

pub use error::{CoreError, Result};

pub use core_auth::{Deployment, RemoteOutcome, SessionBridge, SessionState, UserId, UserProfile};
pub use core_runtime::{BridgeConfig, CoreEvent, EventBus};

use bridge_traits::Subscription;
use core_auth::strip_session_params;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use desktop::{bootstrap_desktop, BootstrapOptions};

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use web::{boot_current_page, bootstrap_web, browser_deployment, WebBootstrapOptions};

/// What the boot sequence found and did.
#[derive(Debug, Clone, PartialEq)]
pub struct BootOutcome {
    /// A session was taken from the page URL.
    pub synced_from_url: bool,
    /// The page URL without session parameters, when it carried any. Hosts
    /// put it in the address bar so tokens do not linger in history.
    pub clean_url: Option<String>,
    /// Session state once booted.
    pub state: SessionState,
}

/// Primary façade exposed to host applications: one per execution context.
pub struct SessionService {
    bridge: Arc<SessionBridge>,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionService {
    /// Create a service whose bridge signals on its own event bus.
    pub fn new(config: BridgeConfig) -> Self {
        Self::from_bridge(SessionBridge::from_config(config))
    }

    /// Create a service signalling on `events`.
    pub fn with_event_bus(config: BridgeConfig, events: EventBus) -> Self {
        Self::from_bridge(SessionBridge::new(config, events))
    }

    fn from_bridge(bridge: SessionBridge) -> Self {
        Self {
            bridge: Arc::new(bridge),
            subscription: Mutex::new(None),
        }
    }

    /// The session bridge of this context.
    pub fn bridge(&self) -> &Arc<SessionBridge> {
        &self.bridge
    }

    pub fn events(&self) -> &EventBus {
        self.bridge.events()
    }

    /// Run the boot sequence for the page at `current_url`.
    ///
    /// Booting again re-runs the URL and expiry steps but keeps the
    /// existing cross-context subscription.
    pub async fn boot(&self, current_url: Option<&str>) -> BootOutcome {
        self.bridge.restore().await;

        let (synced_from_url, clean_url) = match current_url {
            Some(url) => {
                let synced = self.bridge.sync_token_from_url(url).await;
                let stripped = strip_session_params(url);
                let clean = (stripped != url).then_some(stripped);
                (synced, clean)
            }
            None => (false, None),
        };

        if !self.bridge.is_token_valid().await {
            debug!("No valid session after boot");
        }

        self.start_listening();

        let state = self.bridge.state();
        info!(
            synced_from_url,
            authenticated = state.is_authenticated(),
            transport = %self.bridge.transport(),
            "Session service booted"
        );

        BootOutcome {
            synced_from_url,
            clean_url,
            state,
        }
    }

    /// Whether this context follows the other contexts.
    pub fn is_listening(&self) -> bool {
        self.lock_subscription()
            .as_ref()
            .map_or(false, Subscription::is_active)
    }

    /// Stop following the other contexts. Idempotent.
    pub fn shutdown(&self) {
        if let Some(subscription) = self.lock_subscription().take() {
            subscription.unsubscribe();
            debug!("Stopped following other contexts");
        }
    }

    fn start_listening(&self) {
        let mut slot = self.lock_subscription();
        if slot.is_none() {
            *slot = Some(self.bridge.listen());
        }
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
mod desktop {
    use super::{Result, SessionService};
    use bridge_desktop::{default_database_path, ContextHub, SqliteStore};
    use bridge_traits::{HostPlatform, PersistentStore};
    use core_runtime::config::DEFAULT_NAMESPACE;
    use core_runtime::BridgeConfig;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tracing::info;

    /// Settings for [`bootstrap_desktop`].
    #[derive(Clone)]
    pub struct BootstrapOptions {
        /// Directory name under the platform data directory.
        pub app_name: String,
        pub namespace: String,
        /// Overrides the SQLite location derived from `app_name`.
        pub database_path: Option<PathBuf>,
        /// Store shared with the other windows of the process.
        pub store: Option<Arc<dyn PersistentStore>>,
        /// Hub shared with the other windows of the process.
        pub hub: Option<ContextHub>,
        pub web_app_url: Option<String>,
        pub mobile_app_url: Option<String>,
        pub expiry_leeway_secs: u64,
    }

    impl BootstrapOptions {
        pub fn new(app_name: impl Into<String>) -> Self {
            Self {
                app_name: app_name.into(),
                namespace: DEFAULT_NAMESPACE.to_string(),
                database_path: None,
                store: None,
                hub: None,
                web_app_url: None,
                mobile_app_url: None,
                expiry_leeway_secs: 0,
            }
        }

        pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
            self.namespace = namespace.into();
            self
        }

        pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
            self.database_path = Some(path.into());
            self
        }

        pub fn with_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
            self.store = Some(store);
            self
        }

        pub fn with_hub(mut self, hub: ContextHub) -> Self {
            self.hub = Some(hub);
            self
        }

        pub fn with_handoff_urls(
            mut self,
            web_app_url: impl Into<String>,
            mobile_app_url: impl Into<String>,
        ) -> Self {
            self.web_app_url = Some(web_app_url.into());
            self.mobile_app_url = Some(mobile_app_url.into());
            self
        }

        pub fn with_expiry_leeway_secs(mut self, secs: u64) -> Self {
            self.expiry_leeway_secs = secs;
            self
        }
    }

    /// Wire a native execution context: SQLite persistence and an in-process
    /// hub. Native hosts have no tab-scoped mirror.
    ///
    /// ```no_run
    /// # async fn example() -> core_service::Result<()> {
    /// use core_service::{bootstrap_desktop, BootstrapOptions};
    ///
    /// let service = bootstrap_desktop(BootstrapOptions::new("courier-portal")).await?;
    /// let outcome = service.boot(None).await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bootstrap_desktop(options: BootstrapOptions) -> Result<SessionService> {
        let store: Arc<dyn PersistentStore> = match options.store {
            Some(store) => store,
            None => {
                let path = options
                    .database_path
                    .unwrap_or_else(|| default_database_path(&options.app_name));
                info!(path = %path.display(), "Opening session database");
                Arc::new(SqliteStore::new(&path).await?)
            }
        };

        let hub = options
            .hub
            .unwrap_or_else(|| ContextHub::new(options.namespace.clone()));

        let mut builder = BridgeConfig::builder()
            .primary_store(store)
            .notifier(Arc::new(hub.notifier()))
            .host(HostPlatform::Desktop)
            .namespace(options.namespace)
            .expiry_leeway_secs(options.expiry_leeway_secs);
        if let Some(url) = options.web_app_url {
            builder = builder.web_app_url(url);
        }
        if let Some(url) = options.mobile_app_url {
            builder = builder.mobile_app_url(url);
        }

        Ok(SessionService::new(builder.build()?))
    }
}

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
mod web {
    use super::{BootOutcome, CoreError, Result, SessionService};
    use bridge_traits::HostPlatform;
    use bridge_wasm::{build_web_bridges, current_url, replace_url, user_agent, WebBridgeConfig};
    use core_auth::{Deployment, TokenRecord};
    use core_runtime::config::{session_key_for, DEFAULT_NAMESPACE};
    use core_runtime::BridgeConfig;
    use tracing::warn;

    /// Settings for [`bootstrap_web`].
    #[derive(Debug, Clone)]
    pub struct WebBootstrapOptions {
        pub namespace: String,
        /// `BroadcastChannel` name; defaults to the namespace.
        pub channel_name: Option<String>,
        pub web_app_url: Option<String>,
        pub mobile_app_url: Option<String>,
        pub expiry_leeway_secs: u64,
    }

    impl Default for WebBootstrapOptions {
        fn default() -> Self {
            Self {
                namespace: DEFAULT_NAMESPACE.to_string(),
                channel_name: None,
                web_app_url: None,
                mobile_app_url: None,
                expiry_leeway_secs: 0,
            }
        }
    }

    /// Wire a browser tab: `localStorage`, the `sessionStorage` mirror and
    /// the best cross-tab notifier the browser offers.
    pub fn bootstrap_web(options: WebBootstrapOptions) -> Result<SessionService> {
        let channel_name = options
            .channel_name
            .clone()
            .unwrap_or_else(|| options.namespace.clone());
        let bridge_config =
            WebBridgeConfig::new(channel_name, session_key_for(&options.namespace));

        let bridges = build_web_bridges(&bridge_config, TokenRecord::stored_value_decoder())
            .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

        let mut builder = BridgeConfig::builder()
            .primary_store(bridges.primary_store)
            .notifier(bridges.notifier)
            .host(HostPlatform::Web)
            .namespace(options.namespace)
            .expiry_leeway_secs(options.expiry_leeway_secs);
        if let Some(tab_store) = bridges.tab_store {
            builder = builder.tab_store(tab_store);
        }
        if let Some(url) = options.web_app_url {
            builder = builder.web_app_url(url);
        }
        if let Some(url) = options.mobile_app_url {
            builder = builder.mobile_app_url(url);
        }

        Ok(SessionService::new(builder.build()?))
    }

    /// Boot against the page's own URL and scrub session parameters from
    /// the address bar.
    pub async fn boot_current_page(service: &SessionService) -> BootOutcome {
        let url = match current_url() {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Cannot read page URL");
                None
            }
        };

        let outcome = service.boot(url.as_deref()).await;
        if let Some(clean) = &outcome.clean_url {
            if let Err(e) = replace_url(clean) {
                warn!(error = %e, "Failed to scrub session parameters from the address bar");
            }
        }
        outcome
    }

    /// Deployment matching this browser, for redirects with
    /// `SessionBridge::handoff_url`.
    pub fn browser_deployment() -> Deployment {
        user_agent()
            .map(|ua| Deployment::for_user_agent(&ua))
            .unwrap_or(Deployment::Web)
    }
}

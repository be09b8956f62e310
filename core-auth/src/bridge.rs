//! # Session Bridge
//!
//! One authenticated session shared by every execution context of an origin.
//!
//! ## Overview
//!
//! Each context (browser tab, webview, native window) owns one
//! [`SessionBridge`]. The bridge persists the session through a
//! [`TokenStore`], announces every change to the other contexts through the
//! injected [`CrossContextNotifier`], and applies the changes other contexts
//! announce. The rest of the application observes the bridge through the
//! local [`EventBus`] or the [`SessionState`] watch channel.
//!
//! ```text
//!  context A                                         context B
//! ┌───────────────┐  publish(TokenUpdated)  ┌─────────────────────────┐
//! │ save_token()  ├────────────────────────>│ listen() consumer task  │
//! │               │                         │  apply_remote_event()   │
//! └──────┬────────┘                         └──────────┬──────────────┘
//!        │ write                                       │ persist if newer
//!        v                                             v
//!   PersistentStore  <───────── shared or per-context ─────────>
//! ```
//!
//! ## Failure policy
//!
//! Public operations never return errors. Storage failures surface as
//! `false` or `None` and are logged; the `try_*` variants return
//! [`Result`] for callers that need the cause.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{SessionBridge, UserId, UserProfile};
//! use core_runtime::{BridgeConfig, EventBus};
//! use std::sync::Arc;
//! # use bridge_traits::PersistentStore;
//! # async fn example(store: Arc<dyn PersistentStore>) -> core_runtime::Result<()> {
//! let config = BridgeConfig::builder().primary_store(store).build()?;
//! let bridge = Arc::new(SessionBridge::new(config, EventBus::default()));
//! bridge.restore().await;
//! let _subscription = bridge.listen();
//!
//! let profile = UserProfile::new(UserId::Number(1), "Ana");
//! bridge.save_token("abc.def.ghi", Some(profile), Some("ref-1".to_string())).await;
//! assert_eq!(bridge.get_token().await.as_deref(), Some("abc.def.ghi"));
//! # Ok(())
//! # }
//! ```

use crate::claims::TokenClaims;
use crate::error::Result;
use crate::handoff::{build_handoff_url, parse_handoff_url, Deployment};
use crate::token_store::TokenStore;
use crate::types::{SessionState, TokenRecord, UserProfile};
use bridge_traits::{
    Clock, CrossContextNotifier, HostPlatform, NotifierTransport, SessionEvent, Subscription,
};
use core_runtime::events::{AuthEvent, SignInSource, SignOutReason, SyncEvent};
use core_runtime::logging::token_fingerprint;
use core_runtime::{BridgeConfig, CoreEvent, EventBus};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

const TOKEN_UPDATED: &str = "TOKEN_UPDATED";

/// Result of applying an event received from another context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The remote session became this context's session.
    Adopted {
        /// Whether the record was written to the local store.
        persisted: bool,
    },
    /// This context already holds that session.
    AlreadyCurrent,
    /// This context holds a newer session.
    Stale,
    /// The event carried no usable token.
    Rejected,
    /// The session was cleared following a remote logout.
    SignedOut,
}

/// Session bridge of one execution context.
pub struct SessionBridge {
    store: TokenStore,
    notifier: Arc<dyn CrossContextNotifier>,
    clock: Arc<dyn Clock>,
    host: HostPlatform,
    expiry_leeway_secs: u64,
    web_app_url: Option<String>,
    mobile_app_url: Option<String>,
    events: EventBus,
    state: watch::Sender<SessionState>,
    // Serialises every mutation of this context's session.
    write_gate: Mutex<()>,
}

impl SessionBridge {
    /// Create a bridge over the capabilities in `config`, signalling on
    /// `events`.
    ///
    /// The bridge starts [`SessionState::Anonymous`]; call
    /// [`restore`](Self::restore) to load a persisted session.
    pub fn new(config: BridgeConfig, events: EventBus) -> Self {
        let store = TokenStore::new(
            config.primary_store.clone(),
            config.tab_store.clone(),
            config.session_key(),
            config.mirror_key(),
        );
        let (state, _) = watch::channel(SessionState::Anonymous);

        debug!(
            host = %config.host,
            namespace = %config.namespace,
            transport = %config.notifier.transport(),
            "Session bridge created"
        );

        Self {
            store,
            notifier: config.notifier,
            clock: config.clock,
            host: config.host,
            expiry_leeway_secs: config.expiry_leeway_secs,
            web_app_url: config.web_app_url,
            mobile_app_url: config.mobile_app_url,
            events,
            state,
            write_gate: Mutex::new(()),
        }
    }

    /// Create a bridge with its own event bus sized from `config`.
    pub fn from_config(config: BridgeConfig) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        Self::new(config, events)
    }

    /// Load the persisted session into memory without signalling.
    ///
    /// Returns whether a session was found.
    pub async fn restore(&self) -> bool {
        let _guard = self.write_gate.lock().await;

        match self.store.read_record().await {
            Ok(Some(record)) => {
                debug!(
                    token = %token_fingerprint(&record.access_token),
                    "Restored persisted session"
                );
                self.state.send_replace(SessionState::Authenticated(record));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to restore persisted session");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Session operations
    // ------------------------------------------------------------------

    /// Persist a new session and announce it to the other contexts.
    ///
    /// Returns `false` when the token is empty or the primary store refused
    /// the write; nothing is announced in that case.
    pub async fn save_token(
        &self,
        token: &str,
        user_profile: Option<UserProfile>,
        refresh_token: Option<String>,
    ) -> bool {
        match self.try_save_token(token, user_profile, refresh_token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save session");
                false
            }
        }
    }

    pub async fn try_save_token(
        &self,
        token: &str,
        user_profile: Option<UserProfile>,
        refresh_token: Option<String>,
    ) -> Result<()> {
        self.store_session(token, user_profile, refresh_token, SignInSource::Login)
            .await
    }

    /// Current access token.
    ///
    /// Reads the session record, then the tab-scoped mirror. A token whose
    /// `exp` has passed clears the session and yields `None`; tokens without
    /// a readable `exp` are returned as stored.
    pub async fn get_token(&self) -> Option<String> {
        let token = match self.current_token().await {
            Ok(token) => token?,
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                return None;
            }
        };

        if let Ok(claims) = TokenClaims::decode(&token) {
            if self.is_expired(&claims) {
                info!(
                    token = %token_fingerprint(&token),
                    exp = claims.exp,
                    "Access token expired, clearing session"
                );
                self.expire().await;
                return None;
            }
        }

        Some(token)
    }

    pub async fn get_user_profile(&self) -> Option<UserProfile> {
        self.read_record().await?.user_profile
    }

    pub async fn get_refresh_token(&self) -> Option<String> {
        self.read_record().await?.refresh_token
    }

    /// End the session in every store and announce the logout.
    ///
    /// Returns `false` if any removal failed; every removal is attempted
    /// regardless. Idempotent.
    pub async fn clear_token(&self) -> bool {
        match self.try_clear(SignOutReason::Explicit, true).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to clear session");
                false
            }
        }
    }

    /// Whether a token is stored and its `exp` has not passed.
    ///
    /// Fails closed: a token whose expiry cannot be read is invalid. An
    /// expired token clears the session.
    pub async fn is_token_valid(&self) -> bool {
        let token = match self.current_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                return false;
            }
        };

        match TokenClaims::decode(&token) {
            Ok(claims) if self.is_expired(&claims) => {
                info!(
                    token = %token_fingerprint(&token),
                    exp = claims.exp,
                    "Access token expired, clearing session"
                );
                self.expire().await;
                false
            }
            Ok(_) => true,
            Err(e) => {
                debug!(
                    token = %token_fingerprint(&token),
                    error = %e,
                    "Token expiry unreadable, treating as invalid"
                );
                false
            }
        }
    }

    /// Save the session carried by an inbound hand-off URL.
    ///
    /// Returns whether a token was found and saved. A malformed `userData`
    /// parameter does not prevent the save.
    pub async fn sync_token_from_url(&self, url: &str) -> bool {
        let payload = match parse_handoff_url(url) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("No session parameters in URL");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse hand-off URL");
                return false;
            }
        };

        let result = self
            .store_session(
                &payload.token,
                payload.user_profile,
                payload.refresh_token,
                SignInSource::UrlHandoff,
            )
            .await;

        match result {
            Ok(()) => {
                info!(
                    token = %token_fingerprint(&payload.token),
                    profile_malformed = payload.profile_malformed,
                    "Session synced from URL"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save session from URL");
                false
            }
        }
    }

    /// `target_base_url + path` carrying the current session, for handing it
    /// to another deployment. Without a session the bare URL is returned.
    pub async fn generate_auth_url(&self, target_base_url: &str, path: &str) -> String {
        let record = match self.get_token().await {
            Some(token) => Some(match self.read_record().await {
                Some(record) if record.access_token == token => record,
                _ => TokenRecord {
                    access_token: token,
                    refresh_token: None,
                    user_profile: None,
                    last_sync_millis: self.clock.unix_timestamp_millis(),
                },
            }),
            None => None,
        };

        build_handoff_url(target_base_url, path, record.as_ref())
    }

    /// Hand-off URL for a configured deployment; `None` when that
    /// deployment has no base URL.
    pub async fn handoff_url(&self, deployment: Deployment, path: &str) -> Option<String> {
        let base = match deployment {
            Deployment::Web => self.web_app_url.clone(),
            Deployment::Mobile => self.mobile_app_url.clone(),
        };

        match base {
            Some(base) => Some(self.generate_auth_url(&base, path).await),
            None => {
                debug!(deployment = %deployment, "No base URL configured for deployment");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Cross-context sync
    // ------------------------------------------------------------------

    /// Reconcile an event published by another context.
    ///
    /// A `TokenUpdated` newer than the stored record is persisted (never
    /// re-published) and adopted unless this context already holds a newer
    /// session. A `Logout` clears the local stores.
    pub async fn apply_remote_event(&self, event: SessionEvent) -> RemoteOutcome {
        match event {
            SessionEvent::Logout => {
                if let Err(e) = self.try_clear(SignOutReason::RemoteLogout, false).await {
                    warn!(error = %e, "Failed to clear session after remote logout");
                }
                RemoteOutcome::SignedOut
            }
            SessionEvent::TokenUpdated { .. } => match TokenRecord::from_event(&event) {
                Some(incoming) => self.adopt_remote(incoming).await,
                None => {
                    warn!("Ignoring remote session update without a token");
                    self.ignored(event.kind(), "empty token");
                    RemoteOutcome::Rejected
                }
            },
        }
    }

    /// Apply events from other contexts until the returned subscription is
    /// released.
    ///
    /// The consumer holds only a weak reference; dropping the last `Arc`
    /// stops it.
    pub fn listen(self: &Arc<Self>) -> Subscription {
        let transport = self.notifier.transport();
        if !transport.is_available() {
            warn!("No cross-context transport, other contexts' changes will not be seen");
            self.emit(CoreEvent::Sync(SyncEvent::TransportUnavailable));
            return Subscription::inert();
        }

        let (tx, rx) = mpsc::unbounded_channel::<SessionEvent>();
        if !spawn_consumer(Arc::downgrade(self), rx) {
            self.emit(CoreEvent::Sync(SyncEvent::TransportUnavailable));
            return Subscription::inert();
        }

        let inner = self.notifier.subscribe(Arc::new(move |event| {
            // Fails only once the consumer is gone.
            let _ = tx.send(event);
        }));

        info!(transport = %transport, "Listening for other contexts");
        self.emit(CoreEvent::Sync(SyncEvent::Listening {
            transport: transport.to_string(),
        }));

        Subscription::new(Box::new(move || inner.unsubscribe()))
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Last known session of this context.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn host(&self) -> HostPlatform {
        self.host
    }

    pub fn transport(&self) -> NotifierTransport {
        self.notifier.transport()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn store_session(
        &self,
        token: &str,
        user_profile: Option<UserProfile>,
        refresh_token: Option<String>,
        source: SignInSource,
    ) -> Result<()> {
        let _guard = self.write_gate.lock().await;

        let record = TokenRecord::new(
            token,
            user_profile,
            refresh_token,
            self.clock.unix_timestamp_millis(),
        )?;

        self.store.write(&record).await?;
        self.notifier.publish(&record.to_event());

        let previous = self.state.send_replace(SessionState::Authenticated(record));
        let event = if previous.is_authenticated() {
            AuthEvent::TokenRefreshed
        } else {
            AuthEvent::SignedIn { source }
        };
        self.emit(CoreEvent::Auth(event));

        Ok(())
    }

    async fn try_clear(&self, reason: SignOutReason, publish: bool) -> Result<()> {
        let _guard = self.write_gate.lock().await;

        let result = self.store.clear().await;
        if publish {
            self.notifier.publish(&SessionEvent::Logout);
        }

        let previous = self.state.send_replace(SessionState::Anonymous);
        if previous.is_authenticated() || reason == SignOutReason::Expired {
            info!(reason = ?reason, "Session ended");
            self.emit(CoreEvent::Auth(AuthEvent::SignedOut { reason }));
        }

        result
    }

    async fn adopt_remote(&self, incoming: TokenRecord) -> RemoteOutcome {
        let _guard = self.write_gate.lock().await;

        let stored = match self.store.read_record().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read local session while syncing");
                None
            }
        };

        let mut persisted = false;
        // The stored record wins only when strictly newer than the event.
        let (candidate, from_event) = match stored {
            Some(stored) if stored.last_sync_millis > incoming.last_sync_millis => (stored, false),
            Some(stored) if stored.last_sync_millis == incoming.last_sync_millis => {
                (incoming, true)
            }
            _ => {
                match self.store.write(&incoming).await {
                    Ok(()) => persisted = true,
                    Err(e) => warn!(error = %e, "Failed to persist remote session"),
                }
                (incoming, true)
            }
        };

        let current = self.state.borrow().record().cloned();
        if let Some(current) = current {
            if current == candidate && from_event {
                return RemoteOutcome::AlreadyCurrent;
            }
            if current == candidate || current.last_sync_millis > candidate.last_sync_millis {
                debug!(
                    local = current.last_sync_millis,
                    "Local session is newer than remote update"
                );
                self.ignored(TOKEN_UPDATED, "older than local session");
                return RemoteOutcome::Stale;
            }
        }

        if !persisted {
            self.store.write_mirror(&candidate.access_token).await;
        }

        let origin_timestamp = candidate.last_sync_millis;
        info!(
            token = %token_fingerprint(&candidate.access_token),
            origin_timestamp,
            persisted,
            "Adopted session from another context"
        );
        self.state
            .send_replace(SessionState::Authenticated(candidate));
        self.emit(CoreEvent::Auth(AuthEvent::SessionSynced { origin_timestamp }));

        RemoteOutcome::Adopted { persisted }
    }

    async fn current_token(&self) -> Result<Option<String>> {
        match self.store.read_record().await {
            Ok(Some(record)) => return Ok(Some(record.access_token)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Session record unreadable, trying tab mirror"),
        }
        self.store.read_mirror().await
    }

    async fn read_record(&self) -> Option<TokenRecord> {
        match self.store.read_record().await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Failed to read session record");
                None
            }
        }
    }

    async fn expire(&self) {
        if let Err(e) = self.try_clear(SignOutReason::Expired, true).await {
            warn!(error = %e, "Failed to clear expired session");
        }
    }

    fn is_expired(&self, claims: &TokenClaims) -> bool {
        claims.is_expired_at(self.clock.unix_timestamp(), self.expiry_leeway_secs)
    }

    fn ignored(&self, kind: &str, reason: &str) {
        self.emit(CoreEvent::Sync(SyncEvent::RemoteEventIgnored {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }));
    }

    fn emit(&self, event: CoreEvent) {
        // No subscriber is not an error.
        let _ = self.events.emit(event);
    }
}

impl fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBridge")
            .field("store", &self.store)
            .field("transport", &self.notifier.transport())
            .field("host", &self.host)
            .field("authenticated", &self.state.borrow().is_authenticated())
            .finish()
    }
}

async fn consume(bridge: Weak<SessionBridge>, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(bridge) = bridge.upgrade() else {
            break;
        };
        let kind = event.kind();
        let outcome = bridge.apply_remote_event(event).await;
        debug!(kind, outcome = ?outcome, "Applied remote session event");
    }
    debug!("Remote event consumer stopped");
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_consumer(bridge: Weak<SessionBridge>, rx: mpsc::UnboundedReceiver<SessionEvent>) -> bool {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(consume(bridge, rx));
            true
        }
        Err(_) => {
            warn!("No Tokio runtime, remote session events cannot be applied");
            false
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn spawn_consumer(bridge: Weak<SessionBridge>, rx: mpsc::UnboundedReceiver<SessionEvent>) -> bool {
    wasm_bindgen_futures::spawn_local(consume(bridge, rx));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;
    use bridge_desktop::MemoryStore;
    use bridge_traits::{ManualClock, PersistentStore};

    const NOW_SECS: i64 = 1_700_000_000;

    fn jwt(exp: i64) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.sig",
            URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp))
        )
    }

    struct Fixture {
        bridge: SessionBridge,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at_secs(NOW_SECS));
        let config = BridgeConfig::builder()
            .primary_store(store.clone())
            .clock(clock.clone())
            .host(HostPlatform::Desktop)
            .build()
            .unwrap();

        Fixture {
            bridge: SessionBridge::from_config(config),
            store,
            clock,
        }
    }

    fn next_auth(stream: &mut core_runtime::events::Receiver<CoreEvent>) -> Option<CoreEvent> {
        loop {
            match stream.try_recv() {
                Ok(event @ CoreEvent::Auth(_)) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    #[tokio::test]
    async fn test_sign_in_then_refresh_events() {
        let f = fixture();
        let mut events = f.bridge.events().subscribe();

        assert!(f.bridge.save_token("first", None, None).await);
        f.clock.advance_millis(5);
        assert!(f.bridge.save_token("second", None, None).await);

        assert_eq!(
            next_auth(&mut events),
            Some(CoreEvent::Auth(AuthEvent::SignedIn {
                source: SignInSource::Login
            }))
        );
        assert_eq!(
            next_auth(&mut events),
            Some(CoreEvent::Auth(AuthEvent::TokenRefreshed))
        );
        assert_eq!(f.bridge.state().access_token(), Some("second"));
    }

    #[tokio::test]
    async fn test_record_stamped_with_clock() {
        let f = fixture();
        f.bridge.save_token("tok", None, None).await;

        assert_eq!(
            f.bridge.state().last_sync_millis(),
            Some(NOW_SECS * 1_000)
        );
    }

    #[tokio::test]
    async fn test_restore_loads_without_events() {
        let f = fixture();
        let record = TokenRecord::new("persisted", None, None, 1).unwrap();
        f.store
            .set("shared_token:session", &record.to_json().unwrap())
            .await
            .unwrap();

        let mut events = f.bridge.events().subscribe();
        assert!(f.bridge.restore().await);

        assert_eq!(f.bridge.state().access_token(), Some("persisted"));
        assert!(matches!(events.try_recv(), Err(_)));
    }

    #[tokio::test]
    async fn test_expiry_with_leeway() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at_secs(NOW_SECS));
        let config = BridgeConfig::builder()
            .primary_store(store)
            .clock(clock.clone())
            .expiry_leeway_secs(30)
            .build()
            .unwrap();
        let bridge = SessionBridge::from_config(config);

        bridge.save_token(&jwt(NOW_SECS - 10), None, None).await;
        assert!(bridge.is_token_valid().await);

        clock.advance_secs(60);
        assert!(!bridge.is_token_valid().await);
        assert_eq!(bridge.get_token().await, None);
    }

    #[tokio::test]
    async fn test_get_token_expires_lazily() {
        let f = fixture();
        let mut events = f.bridge.events().subscribe();
        f.bridge.save_token(&jwt(NOW_SECS + 60), None, None).await;

        f.clock.advance_secs(120);
        assert_eq!(f.bridge.get_token().await, None);
        assert!(!f.bridge.state().is_authenticated());

        next_auth(&mut events);
        assert_eq!(
            next_auth(&mut events),
            Some(CoreEvent::Auth(AuthEvent::SignedOut {
                reason: SignOutReason::Expired
            }))
        );
    }

    #[tokio::test]
    async fn test_remote_update_newer_is_persisted() {
        let f = fixture();
        let incoming = TokenRecord::new("remote", None, None, NOW_SECS * 1_000 + 10).unwrap();

        let outcome = f.bridge.apply_remote_event(incoming.to_event()).await;

        assert_eq!(outcome, RemoteOutcome::Adopted { persisted: true });
        assert_eq!(f.bridge.get_token().await.as_deref(), Some("remote"));
        assert_eq!(f.bridge.state().access_token(), Some("remote"));
    }

    #[tokio::test]
    async fn test_remote_update_older_is_stale() {
        let f = fixture();
        f.bridge.save_token("local", None, None).await;
        let older = TokenRecord::new("remote", None, None, NOW_SECS * 1_000 - 10).unwrap();

        let outcome = f.bridge.apply_remote_event(older.to_event()).await;

        assert_eq!(outcome, RemoteOutcome::Stale);
        assert_eq!(f.bridge.get_token().await.as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn test_remote_update_already_persisted_by_writer() {
        let f = fixture();
        let record = TokenRecord::new("shared", None, None, 77).unwrap();
        f.store
            .set("shared_token:session", &record.to_json().unwrap())
            .await
            .unwrap();

        let outcome = f.bridge.apply_remote_event(record.to_event()).await;
        assert_eq!(outcome, RemoteOutcome::Adopted { persisted: false });

        let again = f.bridge.apply_remote_event(record.to_event()).await;
        assert_eq!(again, RemoteOutcome::AlreadyCurrent);
    }

    #[tokio::test]
    async fn test_remote_update_with_empty_token_is_rejected() {
        let f = fixture();
        let mut events = f.bridge.events().subscribe();
        let event = SessionEvent::TokenUpdated {
            token: String::new(),
            user_data: None,
            refresh_token: None,
            timestamp: i64::MAX,
        };

        assert_eq!(
            f.bridge.apply_remote_event(event).await,
            RemoteOutcome::Rejected
        );
        assert!(f.store.is_empty().await);
        assert!(matches!(
            events.try_recv(),
            Ok(CoreEvent::Sync(SyncEvent::RemoteEventIgnored { .. }))
        ));
    }

    #[tokio::test]
    async fn test_remote_logout_clears_without_republishing() {
        let f = fixture();
        f.bridge
            .save_token("tok", Some(UserProfile::new(UserId::Number(1), "Ana")), None)
            .await;
        let mut events = f.bridge.events().subscribe();

        let outcome = f.bridge.apply_remote_event(SessionEvent::Logout).await;

        assert_eq!(outcome, RemoteOutcome::SignedOut);
        assert!(f.store.is_empty().await);
        assert_eq!(
            next_auth(&mut events),
            Some(CoreEvent::Auth(AuthEvent::SignedOut {
                reason: SignOutReason::RemoteLogout
            }))
        );
    }

    #[tokio::test]
    async fn test_listen_without_transport() {
        let f = fixture();
        let bridge = Arc::new(f.bridge);
        let mut events = bridge.events().subscribe();

        let subscription = bridge.listen();

        assert!(!subscription.is_active());
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Sync(SyncEvent::TransportUnavailable)
        );
    }

    #[tokio::test]
    async fn test_handoff_url_needs_configured_deployment() {
        let f = fixture();
        assert_eq!(f.bridge.handoff_url(Deployment::Mobile, "/home").await, None);
    }
}

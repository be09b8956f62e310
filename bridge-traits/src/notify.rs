//! Cross-Context Notification Abstraction
//!
//! Propagates session changes between execution contexts that share the same
//! origin and storage (other tabs or windows, or other contexts of the same
//! native process) without a server round-trip.
//!
//! ## Transports
//!
//! | Host    | Preferred                 | Fallback                         |
//! |---------|---------------------------|----------------------------------|
//! | Web     | `BroadcastChannel`        | `storage` events on the record key |
//! | Native  | In-process context hub    | Store change log                 |
//!
//! Fallback transports only observe value changes, not intent, so they
//! synthesise events through [`synthesize_from_change`]: an absent or empty
//! value is a [`SessionEvent::Logout`], anything else is decoded into a
//! [`SessionEvent::TokenUpdated`].
//!
//! ## Delivery
//!
//! Delivery is asynchronous relative to `publish`, at-most-once and
//! best-effort. A context that is not running misses the event. Publishing
//! never delivers to the publishing context itself.

use crate::platform::PlatformSendSync;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Event exchanged between execution contexts.
///
/// Serialised with an upper-case `type` tag so that payloads stay
/// interchangeable with browser contexts:
///
/// ```
/// use bridge_traits::notify::SessionEvent;
///
/// let json = serde_json::to_string(&SessionEvent::Logout).unwrap();
/// assert_eq!(json, r#"{"type":"LOGOUT"}"#);
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    /// A context stored a new access token.
    TokenUpdated {
        token: String,
        #[serde(rename = "userData", default, skip_serializing_if = "Option::is_none")]
        user_data: Option<serde_json::Value>,
        #[serde(
            rename = "refreshToken",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        refresh_token: Option<String>,
        /// Writer's wall-clock time in milliseconds since the Unix epoch.
        timestamp: i64,
    },
    /// A context cleared the session.
    Logout,
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::TokenUpdated { .. } => "TOKEN_UPDATED",
            SessionEvent::Logout => "LOGOUT",
        }
    }
}

// Token values never reach logs through `{:?}`.
impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::TokenUpdated {
                user_data,
                refresh_token,
                timestamp,
                ..
            } => f
                .debug_struct("TokenUpdated")
                .field("token", &"[REDACTED]")
                .field("has_user_data", &user_data.is_some())
                .field("has_refresh_token", &refresh_token.is_some())
                .field("timestamp", timestamp)
                .finish(),
            SessionEvent::Logout => f.write_str("Logout"),
        }
    }
}

/// Mechanism a notifier uses to reach other contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifierTransport {
    /// Browser `BroadcastChannel`.
    BroadcastChannel,
    /// Browser `storage` events.
    StorageEvents,
    /// Native in-process hub shared by contexts.
    InProcess,
    /// Native store change log.
    StoreChangeLog,
    /// No mechanism available; cross-context sync is disabled.
    None,
}

impl NotifierTransport {
    /// Whether publishing reaches other contexts at all.
    pub fn is_available(&self) -> bool {
        !matches!(self, NotifierTransport::None)
    }
}

impl fmt::Display for NotifierTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotifierTransport::BroadcastChannel => "broadcast_channel",
            NotifierTransport::StorageEvents => "storage_events",
            NotifierTransport::InProcess => "in_process",
            NotifierTransport::StoreChangeLog => "store_change_log",
            NotifierTransport::None => "none",
        };
        f.write_str(name)
    }
}

/// Callback invoked for each event received from another context.
#[cfg(not(target_arch = "wasm32"))]
pub type EventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

#[cfg(target_arch = "wasm32")]
pub type EventCallback = Arc<dyn Fn(SessionEvent)>;

/// Turns a stored record value into a `TokenUpdated` event.
#[cfg(not(target_arch = "wasm32"))]
pub type StoredValueDecoder = Arc<dyn Fn(&str) -> Option<SessionEvent> + Send + Sync>;

#[cfg(target_arch = "wasm32")]
pub type StoredValueDecoder = Arc<dyn Fn(&str) -> Option<SessionEvent>>;

/// Releases the resources held by a subscription.
#[cfg(not(target_arch = "wasm32"))]
pub type Teardown = Box<dyn FnOnce() + Send>;

#[cfg(target_arch = "wasm32")]
pub type Teardown = Box<dyn FnOnce()>;

/// Handle to an active subscription.
///
/// [`unsubscribe`](Subscription::unsubscribe) may be called any number of
/// times; only the first call releases resources. Dropping the handle
/// unsubscribes as well.
pub struct Subscription {
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` once when released.
    pub fn new(teardown: Teardown) -> Self {
        Self {
            teardown: Mutex::new(Some(teardown)),
        }
    }

    /// A subscription that holds nothing, for transports that cannot deliver.
    pub fn inert() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    /// Deregister the callback and release transport resources.
    pub fn unsubscribe(&self) {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Whether the subscription still holds resources.
    pub fn is_active(&self) -> bool {
        self.teardown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Cross-context notifier trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::notify::{CrossContextNotifier, SessionEvent};
/// use std::sync::Arc;
///
/// fn watch(notifier: &dyn CrossContextNotifier) {
///     let subscription = notifier.subscribe(Arc::new(|event| {
///         println!("other tab says: {}", event.kind());
///     }));
///     notifier.publish(&SessionEvent::Logout);
///     subscription.unsubscribe();
/// }
/// ```
pub trait CrossContextNotifier: PlatformSendSync {
    /// Announce an event to every other context. Never fails; without a
    /// transport this is a silent no-op.
    fn publish(&self, event: &SessionEvent);

    /// Register `callback` for events published by other contexts.
    fn subscribe(&self, callback: EventCallback) -> Subscription;

    /// Transport used by this notifier
    fn transport(&self) -> NotifierTransport;
}

/// Notifier for hosts without any cross-context mechanism.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl CrossContextNotifier for NoopNotifier {
    fn publish(&self, _event: &SessionEvent) {}

    fn subscribe(&self, _callback: EventCallback) -> Subscription {
        Subscription::inert()
    }

    fn transport(&self) -> NotifierTransport {
        NotifierTransport::None
    }
}

/// Build the event implied by a change of the watched record key.
///
/// Returns `None` when a present value cannot be decoded; such a change is
/// not actionable.
pub fn synthesize_from_change(
    new_value: Option<&str>,
    decode: &StoredValueDecoder,
) -> Option<SessionEvent> {
    match new_value {
        None => Some(SessionEvent::Logout),
        Some(value) if value.trim().is_empty() => Some(SessionEvent::Logout),
        Some(value) => decode(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_token_updated_wire_format() {
        let event = SessionEvent::TokenUpdated {
            token: "tok".to_string(),
            user_data: Some(serde_json::json!({"id": 1})),
            refresh_token: None,
            timestamp: 42,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "TOKEN_UPDATED");
        assert_eq!(value["token"], "tok");
        assert_eq!(value["userData"]["id"], 1);
        assert!(value.get("refreshToken").is_none());
        assert_eq!(value["timestamp"], 42);

        let parsed: SessionEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_debug_redacts_token() {
        let event = SessionEvent::TokenUpdated {
            token: "super-secret".to_string(),
            user_data: None,
            refresh_token: Some("also-secret".to_string()),
            timestamp: 1,
        };

        let rendered = format!("{:?}", event);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("also-secret"));
    }

    #[test]
    fn test_subscription_unsubscribe_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = Subscription::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(subscription.is_active());
        subscription.unsubscribe();
        subscription.unsubscribe();
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_subscription() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        {
            let _subscription = Subscription::new(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_notifier() {
        let notifier = NoopNotifier;
        notifier.publish(&SessionEvent::Logout);
        let subscription = notifier.subscribe(Arc::new(|_| panic!("never delivered")));
        assert!(!subscription.is_active());
        assert!(!notifier.transport().is_available());
    }

    #[test]
    fn test_synthesize_from_change() {
        let decode: StoredValueDecoder = Arc::new(|value: &str| {
            Some(SessionEvent::TokenUpdated {
                token: value.to_string(),
                user_data: None,
                refresh_token: None,
                timestamp: 7,
            })
        });

        assert_eq!(
            synthesize_from_change(None, &decode),
            Some(SessionEvent::Logout)
        );
        assert_eq!(
            synthesize_from_change(Some("  "), &decode),
            Some(SessionEvent::Logout)
        );
        assert!(matches!(
            synthesize_from_change(Some("abc"), &decode),
            Some(SessionEvent::TokenUpdated { ref token, .. }) if token == "abc"
        ));

        let reject: StoredValueDecoder = Arc::new(|_: &str| None);
        assert_eq!(synthesize_from_change(Some("garbage"), &reject), None);
    }
}

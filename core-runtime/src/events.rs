//! # Event Bus System
//!
//! Local (same-context) event bus built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The session bridge signals the rest of the application through this bus:
//! an authentication provider, a router guard or a UI shell subscribes and
//! reacts to sign-in, refresh, sync and sign-out without polling storage.
//!
//! This bus never leaves the execution context. Propagation between
//! contexts is the job of the cross-context notifier.
//!
//! ```text
//! ┌───────────────┐   emit   ┌───────────┐  subscribe  ┌─────────────────┐
//! │ SessionBridge ├─────────>│ EventBus  ├────────────>│ Auth provider   │
//! └───────────────┘          │ (broadcast│             └─────────────────┘
//!                            │  channel) │  subscribe  ┌─────────────────┐
//!                            │           ├────────────>│ Redirect guard  │
//!                            └───────────┘             └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus, SignInSource};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
//!     source: SignInSource::Login,
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "User signed in");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscriber returns `Err`, which publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle
    Auth(AuthEvent),
    /// Cross-context sync plumbing
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::TransportUnavailable) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedOut {
                reason: SignOutReason::Expired,
            }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Auth(AuthEvent::SignedOut { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// How a session came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInSource {
    /// Explicit login in this context.
    Login,
    /// Token carried in the URL of an inbound hand-off.
    UrlHandoff,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutReason {
    /// Explicit logout in this context.
    Explicit,
    /// The access token's `exp` claim has passed.
    Expired,
    /// Another context logged out.
    RemoteLogout,
}

/// Session lifecycle events of one execution context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Anonymous to authenticated.
    SignedIn { source: SignInSource },
    /// A new access token replaced the current one.
    TokenRefreshed,
    /// Session adopted from another context.
    SessionSynced {
        /// Writer's wall-clock time in milliseconds.
        origin_timestamp: i64,
    },
    /// Authenticated to anonymous.
    SignedOut { reason: SignOutReason },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignedIn { .. } => "User signed in",
            AuthEvent::TokenRefreshed => "Access token replaced",
            AuthEvent::SessionSynced { .. } => "Session synced from another context",
            AuthEvent::SignedOut { .. } => "User signed out",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Cross-context sync plumbing events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// The bridge is listening for other contexts.
    Listening {
        /// Transport name, e.g. `broadcast_channel`.
        transport: String,
    },
    /// No transport exists; this context will not see other contexts' changes.
    TransportUnavailable,
    /// A remote event was received but not applied.
    RemoteEventIgnored {
        /// `TOKEN_UPDATED` or `LOGOUT`.
        kind: String,
        reason: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Listening { .. } => "Listening for other contexts",
            SyncEvent::TransportUnavailable => "Cross-context sync unavailable",
            SyncEvent::RemoteEventIgnored { .. } => "Remote session event ignored",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for one execution context.
///
/// Cheap to clone; clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber falling behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Filtered stream over a new subscription.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let bus = EventBus::new(100);
/// let auth_only = bus.stream().filter(|event| matches!(event, CoreEvent::Auth(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Receives without waiting; `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

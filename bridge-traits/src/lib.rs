//! # Host Bridge Traits
//!
//! Capability contracts the session bridge needs from its host.
//!
//! ## Overview
//!
//! The session bridge keeps one authenticated session in sync across every
//! execution context of an origin (browser tabs, mobile webviews, native
//! windows). It never touches a host API directly; each host ships adapters
//! for the traits below and injects them at construction time.
//!
//! ## Traits
//!
//! ### Storage
//! - [`PersistentStore`](storage::PersistentStore) - Async key-value persistence
//!
//! ### Cross-context sync
//! - [`CrossContextNotifier`](notify::CrossContextNotifier) - Publish/subscribe
//!   of [`SessionEvent`](notify::SessionEvent)s between contexts
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Host Adapters
//!
//! | Host    | Implementation Crate | Stores                                 | Notifier |
//! |---------|----------------------|----------------------------------------|----------|
//! | Desktop | `bridge-desktop`     | `SqliteStore`, `MemoryStore`           | `HubNotifier`, `StoreWatchNotifier` |
//! | Web     | `bridge-wasm`        | `WebStorageStore` (local / session)    | `BroadcastChannelNotifier`, `StorageEventNotifier` |
//! | Mobile  | host supplied        | async key-value store                  | host supplied or `NoopNotifier` |
//!
//! ## Fail-Fast Strategy
//!
//! Missing required capabilities are reported at construction time:
//!
//! ```ignore
//! use core_runtime::config::BridgeConfig;
//!
//! let config = BridgeConfig::builder()
//!     .notifier(notifier)
//!     .build()?; // Error::CapabilityMissing { capability: "PersistentStore", .. }
//! ```
//!
//! ## Error Handling
//!
//! Every adapter reports failures as [`BridgeError`](error::BridgeError).
//! A medium that refuses writes (quota, private browsing, locked database)
//! maps to [`BridgeError::StorageUnavailable`].
//!
//! ## Thread Safety
//!
//! On native targets every trait requires `Send + Sync`. On `wasm32` the
//! bounds are dropped through [`PlatformSendSync`](platform::PlatformSendSync)
//! because browser handles are single-threaded.

pub mod error;
pub mod notify;
pub mod platform;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use notify::{
    synthesize_from_change, CrossContextNotifier, EventCallback, NoopNotifier, NotifierTransport,
    SessionEvent, StoredValueDecoder, Subscription, Teardown,
};
pub use platform::{HostPlatform, PlatformSendSync};
pub use storage::{PersistentStore, StoreKind};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};

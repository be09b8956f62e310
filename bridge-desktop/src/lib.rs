//! # Desktop Bridge Implementations
//!
//! Native host adapters for the session bridge (macOS, Windows, Linux, and
//! any other Tokio host).
//!
//! - [`SqliteStore`]: persistent store on a SQLite key/value table
//! - [`MemoryStore`]: process-memory store, tab-scoped analogue and test double
//! - [`ContextHub`] / [`HubNotifier`]: in-process broadcast between contexts
//! - [`WatchedStore`] / [`StoreWatchNotifier`]: change-log fallback when
//!   contexts share a store but no hub
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{default_database_path, ContextHub, SqliteStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let store = Arc::new(SqliteStore::new(default_database_path("courier-portal")).await?);
//!     let hub = ContextHub::new("shared_token");
//!     let window_a = hub.notifier();
//!     let window_b = hub.notifier();
//!     // hand `store` and one notifier to each context's bridge
//!     Ok(())
//! }
//! ```

mod hub;
mod memory_store;
mod sqlite_store;
mod watch;

pub use hub::{ContextHub, ContextId, HubNotifier, DEFAULT_HUB_CAPACITY};
pub use memory_store::MemoryStore;
pub use sqlite_store::{default_database_path, SqliteStore};
pub use watch::{ChangeLog, StoreChange, StoreWatchNotifier, WatchedStore};

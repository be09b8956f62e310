//! WebAssembly Bridge Implementations
//!
//! This crate provides browser implementations of the bridge traits defined
//! in `bridge-traits`, built on `web-sys` and `wasm-bindgen`.
//!
//! # Platform Support
//!
//! This crate is designed exclusively for the `wasm32-unknown-unknown` target.
//! It compiles to nothing on native targets.
//!
//! # Implementations
//!
//! - `WebStorageStore`: `localStorage` (persistent) and `sessionStorage`
//!   (tab-scoped) key/value stores
//! - `BroadcastChannelNotifier`: cross-tab events over `BroadcastChannel`
//! - `StorageEventNotifier`: fallback synthesising events from `storage` events
//!
//! # Examples
//!
//! ```ignore
//! use bridge_wasm::{build_web_bridges, WebBridgeConfig};
//!
//! let config = WebBridgeConfig::new("shared_token", "shared_token:session");
//! let bridges = build_web_bridges(&config, decoder)?;
//! // hand the stores and notifier to the session bridge
//! ```

#![cfg(target_arch = "wasm32")]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod broadcast;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use bootstrap::{
    best_notifier, build_web_bridges, current_url, replace_url, user_agent, WebBridgeConfig,
    WebBridgeSet,
};
pub use broadcast::{BroadcastChannelNotifier, StorageEventNotifier};
pub use error::{WasmError, WasmResult};
pub use storage::WebStorageStore;

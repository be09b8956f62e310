//! Workspace façade crate.
//!
//! Exposes the feature flags that select a host (`desktop-shims` or `wasm`)
//! and re-exports the session service, so host applications can depend on
//! `session-bridge-workspace` without wiring each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "wasm"))]
pub use core_service::*;

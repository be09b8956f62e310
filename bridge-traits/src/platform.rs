//! Platform-specific helper abstractions used to keep trait bounds aligned with
//! the threading guarantees of each target.
//!
//! Native targets require `Send + Sync` to allow bridge implementations to be
//! shared freely across async tasks. WebAssembly builds, however, run entirely
//! on a single thread and cannot satisfy those bounds because browser-provided
//! objects (e.g., `web_sys::Storage`, `web_sys::BroadcastChannel`) are not
//! thread-safe. The helper traits below make the required bounds conditional
//! without duplicating every trait definition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker trait that applies `Send + Sync` on native targets while becoming a
/// no-op on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}

/// The kind of host the session bridge is running in.
///
/// The bridge itself never branches on the host for storage or transport
/// decisions; those are made once, when the host adapters are wired. The
/// host is still surfaced so callers can choose hand-off targets and so the
/// mirror store is only expected where a tab-scoped medium exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostPlatform {
    /// Browser deployment: persistent `localStorage` plus a tab-scoped
    /// `sessionStorage` mirror.
    Web,
    /// Mobile shell with an asynchronous persistent store.
    Mobile,
    /// Native desktop process.
    Desktop,
}

impl HostPlatform {
    /// Detect the host from the compilation target.
    ///
    /// # Examples
    ///
    /// ```
    /// use bridge_traits::HostPlatform;
    ///
    /// let host = HostPlatform::detect();
    /// # #[cfg(not(any(target_arch = "wasm32", target_os = "android", target_os = "ios")))]
    /// assert_eq!(host, HostPlatform::Desktop);
    /// ```
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            HostPlatform::Web
        } else if cfg!(any(target_os = "android", target_os = "ios")) {
            HostPlatform::Mobile
        } else {
            HostPlatform::Desktop
        }
    }

    /// Whether this host provides a tab-scoped store worth mirroring into.
    pub fn has_tab_scoped_storage(&self) -> bool {
        matches!(self, HostPlatform::Web)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostPlatform::Web => "web",
            HostPlatform::Mobile => "mobile",
            HostPlatform::Desktop => "desktop",
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_web_has_tab_scoped_storage() {
        assert!(HostPlatform::Web.has_tab_scoped_storage());
        assert!(!HostPlatform::Mobile.has_tab_scoped_storage());
        assert!(!HostPlatform::Desktop.has_tab_scoped_storage());
    }

    #[test]
    fn test_host_serialization() {
        let json = serde_json::to_string(&HostPlatform::Mobile).unwrap();
        assert_eq!(json, "\"mobile\"");
        assert_eq!(HostPlatform::Web.to_string(), "web");
    }
}

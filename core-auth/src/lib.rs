//! # Session Module
//!
//! Shared bearer-token session for every execution context of an origin.
//!
//! ## Overview
//!
//! This module keeps one authenticated session consistent across browser
//! tabs, mobile webviews and native windows. It persists the session record,
//! propagates changes to the other contexts, detects expiry and hands the
//! session between the web and mobile deployments through URLs.
//!
//! ## Features
//!
//! - Single-key session record with optional tab-scoped token mirror
//! - Cross-context propagation of sign-in, refresh and logout
//! - Lazy, fail-closed expiry from the token's `exp` claim
//! - URL hand-off between deployments
//! - Session state events on the local event bus

pub mod bridge;
pub mod claims;
pub mod error;
pub mod handoff;
pub mod token_store;
pub mod types;

pub use bridge::{RemoteOutcome, SessionBridge};
pub use claims::TokenClaims;
pub use error::{AuthError, Result};
pub use handoff::{build_handoff_url, parse_handoff_url, strip_session_params, Deployment};
pub use token_store::TokenStore;
pub use types::{SessionState, TokenRecord, UserId, UserProfile};

//! # Core Runtime Module
//!
//! Ambient runtime shared by the session bridge crates:
//! - Logging and tracing infrastructure
//! - Bridge configuration builder
//! - Local event bus
//!
//! ## Overview
//!
//! Nothing in here knows about tokens. The auth crate builds on these pieces
//! and host crates configure them.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};

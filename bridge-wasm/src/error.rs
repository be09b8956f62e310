//! Error types for WebAssembly bridge implementations

use bridge_traits::error::BridgeError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Result type for WebAssembly bridge operations
pub type WasmResult<T> = Result<T, WasmError>;

/// Errors that can occur in WebAssembly bridge implementations
#[derive(Error, Debug)]
pub enum WasmError {
    /// A browser API is missing or blocked (no window, storage disabled)
    #[error("Browser API not available: {0}")]
    NotAvailable(String),

    /// The storage quota is exhausted, or the browser refuses writes
    /// (private browsing)
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// JavaScript error from web-sys
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<WasmError> for BridgeError {
    fn from(err: WasmError) -> Self {
        match err {
            WasmError::NotAvailable(msg) => BridgeError::NotAvailable(msg),
            WasmError::QuotaExceeded(msg) => BridgeError::StorageUnavailable(msg),
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

impl From<JsValue> for WasmError {
    fn from(js_value: JsValue) -> Self {
        if let Some(exception) = js_value.dyn_ref::<web_sys::DomException>() {
            let message = exception.message();
            return match exception.name().as_str() {
                "QuotaExceededError" => WasmError::QuotaExceeded(message),
                "SecurityError" => WasmError::NotAvailable(message),
                name => WasmError::JavaScript(format!("{}: {}", name, message)),
            };
        }

        let msg = if js_value.is_string() {
            js_value
                .as_string()
                .unwrap_or_else(|| "Unknown error".to_string())
        } else if let Some(error) = js_value.dyn_ref::<js_sys::Error>() {
            error.message().into()
        } else {
            format!("{:?}", js_value)
        };
        WasmError::JavaScript(msg)
    }
}

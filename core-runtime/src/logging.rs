//! # Logging & Tracing Infrastructure
//!
//! Structured logging with the `tracing` crate:
//! - Pretty, JSON and compact output formats
//! - Module-level filtering through `EnvFilter`
//! - Forwarding to a host pipeline via `LoggerSink`
//! - Token fingerprints and field redaction helpers
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Pretty)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//!
//! init_logging(config)?;
//! tracing::info!("Session bridge starting");
//! ```
//!
//! ## Tokens in logs
//!
//! Token values are never logged. Log a [`token_fingerprint`] instead, which
//! is stable for a given token and lets two contexts' logs be correlated:
//!
//! ```
//! use core_runtime::logging::token_fingerprint;
//!
//! let fp = token_fingerprint("abc.def.ghi");
//! assert!(fp.starts_with("sha256:"));
//! assert!(!fp.contains("abc"));
//! ```
//!
//! On `wasm32` the subscriber writes to the browser console through
//! `tracing-wasm`; a configured `LoggerSink` is not used there.

use crate::error::{Error, Result};
use bridge_traits::time::{LogLevel, LoggerSink};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use bridge_traits::time::LogEntry;
#[cfg(not(target_arch = "wasm32"))]
use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::fmt;
#[cfg(not(target_arch = "wasm32"))]
use std::io;
#[cfg(not(target_arch = "wasm32"))]
use tracing::field::{Field, Visit};
#[cfg(not(target_arch = "wasm32"))]
use tracing::{Event, Subscriber};
#[cfg(not(target_arch = "wasm32"))]
use tracing_subscriber::{
    filter::EnvFilter,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Crates whose events the default filter lets through at the configured level.
const BRIDGE_CRATES: &[&str] = &[
    "bridge_traits",
    "bridge_desktop",
    "bridge_wasm",
    "core_runtime",
    "core_auth",
    "core_service",
    "session_bridge_workspace",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Minimum level for the bridge crates
    pub level: LogLevel,
    /// Custom filter string (e.g., "core_auth=debug,bridge_desktop=trace")
    pub filter: Option<String>,
    /// Optional logger sink for forwarding logs to host
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set custom filter string
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set logger sink for host integration
    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

fn level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Filter directives for `config`: the custom filter if any, otherwise the
/// bridge crates at the configured level and `sqlx` at warn.
pub fn filter_directives(config: &LoggingConfig) -> String {
    if let Some(custom) = &config.filter {
        return custom.clone();
    }

    let level = level_str(config.level);
    let mut directives: Vec<String> = BRIDGE_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect();
    directives.push("sqlx=warn".to_string());
    directives.join(",")
}

/// Initialize the logging system
///
/// Call once during startup; a second call fails with [`Error::Config`].
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let sink_layer = LoggerSinkLayer::new(config.logger_sink.clone());

    let registry = tracing_subscriber::registry().with(filter).with(sink_layer);

    let span_events = if config.enable_spans {
        tracing_subscriber::fmt::format::FmtSpan::ACTIVE
    } else {
        tracing_subscriber::fmt::format::FmtSpan::NONE
    };

    let result = match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_span_events(span_events)
                    .with_writer(io::stdout),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(config.enable_spans)
                    .with_span_list(config.enable_spans)
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_writer(io::stdout),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_writer(io::stdout),
            )
            .try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

/// Initialize logging for the browser console.
#[cfg(target_arch = "wasm32")]
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let max_level = match config.level {
        LogLevel::Trace => tracing::Level::TRACE,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    };

    let wasm_config = tracing_wasm::WASMLayerConfigBuilder::new()
        .set_max_level(max_level)
        .build();

    tracing_subscriber::registry()
        .with(tracing_wasm::WASMLayer::new(wasm_config))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(not(target_arch = "wasm32"))]
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(filter_directives(config))
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Layer that forwards events to a `LoggerSink` implementation.
#[cfg(not(target_arch = "wasm32"))]
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

#[cfg(not(target_arch = "wasm32"))]
impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = tracing_level_to_log_level(*metadata.level());

        if level < sink.min_level() {
            return;
        }

        let mut visitor = SinkVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());

        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (key, value) in visitor.fields {
            entry = entry.with_field(key.clone(), redact_if_sensitive(&key, &value));
        }

        if let Some(span) = ctx.lookup_current() {
            entry.span_id = Some(span.name().to_string());
        }

        let sink = Arc::clone(sink);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
            return;
        }

        if let Err(err) = futures::executor::block_on(sink.log(entry)) {
            eprintln!("LoggerSink error: {}", err);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Default)]
struct SinkVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

#[cfg(not(target_arch = "wasm32"))]
impl SinkVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Visit for SinkVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn tracing_level_to_log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Short, non-reversible identifier of a token for log correlation.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("sha256:{}", hex)
}

/// Redact a field value when its name marks it as sensitive
///
/// Credentials are replaced entirely; email-looking values keep their first
/// character only.
///
/// ```ignore
/// use core_runtime::logging::redact_if_sensitive;
///
/// info!(phone = %redact_if_sensitive("phone", &profile.phone), "Profile cached");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    const SENSITIVE_FIELDS: &[&str] = &[
        "token",
        "password",
        "secret",
        "authorization",
        "bearer",
        "user_data",
        "userdata",
        "phone",
    ];

    let field_lower = field_name.to_lowercase();
    if SENSITIVE_FIELDS.iter().any(|&f| field_lower.contains(f)) {
        return "[REDACTED]".to_string();
    }

    match value.find('@') {
        Some(at_pos) if value[at_pos..].contains('.') => {
            let initial: String = value[..at_pos].chars().take(1).collect();
            format!("{}***@[REDACTED]", initial)
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_filter("core_auth=trace")
            .with_spans(false)
            .with_target(true)
            .with_thread_info(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter, Some("core_auth=trace".to_string()));
        assert!(!config.enable_spans);
        assert!(config.display_thread_info);
    }

    #[test]
    fn test_default_directives_cover_bridge_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let directives = filter_directives(&config);

        assert!(directives.contains("core_auth=debug"));
        assert!(directives.contains("bridge_desktop=debug"));
        assert!(directives.ends_with("sqlx=warn"));
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_custom_filter_wins() {
        let config = LoggingConfig::default().with_filter("core_auth=trace");
        assert_eq!(filter_directives(&config), "core_auth=trace");
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = LoggingConfig::default().with_filter("core_auth=notalevel");
        assert!(matches!(build_filter(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_token_fingerprint() {
        let a = token_fingerprint("abc.def.ghi");
        let b = token_fingerprint("abc.def.ghi");
        let c = token_fingerprint("abc.def.ghj");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), "sha256:".len() + 12);
    }

    #[test]
    fn test_redact_if_sensitive() {
        assert_eq!(redact_if_sensitive("access_token", "secret123"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("refreshToken", "r"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("userData", "{}"), "[REDACTED]");
        assert_eq!(redact_if_sensitive("phone", "+84123"), "[REDACTED]");

        let redacted = redact_if_sensitive("email", "user@example.com");
        assert!(redacted.starts_with('u'));
        assert!(!redacted.contains("example.com"));

        assert_eq!(redact_if_sensitive("namespace", "shared_token"), "shared_token");
    }

    #[test]
    fn test_redact_email_with_multibyte_initial() {
        assert_eq!(
            redact_if_sensitive("contact", "ñandu@correo.es"),
            "ñ***@[REDACTED]"
        );
        assert_eq!(
            redact_if_sensitive("contact", "@correo.es"),
            "***@[REDACTED]"
        );
    }

    #[test]
    fn test_logger_sink_layer_forwards_event() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!(target: "core_auth::bridge", store = "persistent", token = "abc", "saved");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_auth::bridge");
        assert_eq!(entry.message, "saved");
        assert_eq!(entry.fields.get("store"), Some(&"persistent".to_string()));
        assert_eq!(entry.fields.get("token"), Some(&"[REDACTED]".to_string()));
    }

    #[derive(Default)]
    struct TestLoggerSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for TestLoggerSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Trace
        }
    }
}

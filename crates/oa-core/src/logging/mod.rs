//! Structured logging foundation for oa-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for pipelines
//!
//! # Usage
//!
//! ```ignore
//! use oa_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//!
//! let ctx = LogContext::new(generate_run_id()).with_process_definition_key("invoice");
//! log_event!(ctx, INFO, event_names::ANALYSIS_STARTED, Stage::Init, "Starting analysis");
//! ```
//!
//! stdout is reserved for command payloads (JSON/MD output); all log output
//! goes to stderr.

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber on stderr.
///
/// `RUST_LOG` directives, when present, replace the configured level
/// entirely. Calling it again is a no-op.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from(config.level).into())
            .parse_lossy("")
    });

    let _ = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &hex[..12])
}

/// Emit a structured event carrying the context's run id and process
/// definition. The level is one of `TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`.
///
/// ```ignore
/// log_event!(ctx, INFO, event_names::CHART_COMPUTED, Stage::Chart, "chart ready",
///     buckets = 42u64);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, $level:ident, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::event!(
            target: $event,
            tracing::Level::$level,
            run_id = $ctx.run_id.as_str(),
            process_definition_key = $ctx.process_definition_key.as_deref().unwrap_or(""),
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
}

//! Structured event definitions for logging.
//!
//! Every event carries the run id and the stage that produced it; the
//! event name is the tracing target.

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Processing stages of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Dataset loading.
    Load,
    /// Duration chart computation.
    Chart,
    /// Per-flow-node outlier findings and heat.
    Findings,
    /// Variable significance analysis.
    Terms,
    /// Outlier instance export.
    Instances,
    /// Output rendering.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Chart => "chart",
            Stage::Findings => "findings",
            Stage::Terms => "terms",
            Stage::Instances => "instances",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const ANALYSIS_STARTED: &str = "analysis.started";
    pub const ANALYSIS_FINISHED: &str = "analysis.finished";

    // Load stage
    pub const DATASET_LOADED: &str = "dataset.loaded";

    // Engine stages
    pub const CHART_COMPUTED: &str = "chart.computed";
    pub const BOUNDS_COMPUTED: &str = "bounds.computed";
    pub const FINDINGS_COMPUTED: &str = "findings.computed";
    pub const TERMS_SAMPLED: &str = "terms.sampled";
    pub const TERMS_COMPUTED: &str = "terms.computed";
    pub const INSTANCES_PAGE: &str = "instances.page";
    pub const INSTANCES_LISTED: &str = "instances.listed";

    // Gateway
    pub const GATEWAY_INDEX_MISSING: &str = "gateway.index_missing";
    pub const GATEWAY_ERROR: &str = "gateway.error";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    // Error events
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Context for generating log events with a consistent run id.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    /// Process definition under analysis.
    pub process_definition_key: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            process_definition_key: None,
        }
    }

    pub fn with_process_definition_key(mut self, key: impl Into<String>) -> Self {
        self.process_definition_key = Some(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context() {
        let ctx = LogContext::new("run-abc").with_process_definition_key("invoice");
        assert_eq!(ctx.run_id, "run-abc");
        assert_eq!(ctx.process_definition_key.as_deref(), Some("invoice"));
        assert!(LogContext::new("run-x").process_definition_key.is_none());
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [Stage::Init, Stage::Chart, Stage::Terms, Stage::Instances] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_names::CHART_COMPUTED, "chart.computed");
        assert_eq!(event_names::GATEWAY_INDEX_MISSING, "gateway.index_missing");
    }
}

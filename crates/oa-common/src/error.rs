//! Error types for outlier analysis.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Missing Outlier Bounds
//!   Reason: at least one outlier bound is required
//!   Fix: Pass --lower and/or --higher, or take them from 'oa-core bounds'.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 13,
//!   "category": "validation",
//!   "message": "at least one outlier bound is required",
//!   "recoverable": true,
//!   "suggested_action": "fix_input"
//! }
//! ```
//!
//! An empty population (unknown process definition, missing index) is not an
//! error anywhere in the engine; it surfaces as an empty result instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for outlier analysis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller-supplied input rejected before any work was done.
    Validation,
    /// Aggregate store failures.
    Gateway,
    /// Numeric or analysis failures.
    Analysis,
    /// File I/O and serialization errors.
    Io,
    /// Configuration file errors.
    Config,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Gateway => write!(f, "gateway"),
            ErrorCategory::Analysis => write!(f, "analysis"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Config => write!(f, "config"),
        }
    }
}

/// Suggested actions for automated callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation (possibly with backoff).
    Retry,
    /// Correct the request and resubmit.
    FixInput,
    /// Reset configuration to defaults.
    ResetConfig,
    /// Run `config validate`.
    RunCheck,
    /// Abort the operation.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::ResetConfig => write!(f, "reset_config"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for outlier analysis.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (10-19)
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("target bucket count must be positive (got {count})")]
    InvalidBucketCount { count: i64 },

    #[error("invalid range: min {min} exceeds max {max}")]
    InvalidRange { min: f64, max: f64 },

    #[error("at least one outlier bound is required")]
    MissingOutlierBounds,

    // Gateway errors (20-29)
    #[error("aggregate store unavailable: {0}")]
    Gateway(String),

    #[error("aggregate store rejected query: {0}")]
    InvalidQuery(String),

    // Analysis errors (30-39)
    #[error("analysis failed: {0}")]
    Analysis(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid dataset: {0}")]
    Dataset(String),

    // Configuration errors (70-79)
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Validation errors
    /// - 20-29: Gateway errors
    /// - 30-39: Analysis errors
    /// - 60-69: I/O errors
    /// - 70-79: Configuration errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Validation(_) => 10,
            Error::InvalidBucketCount { .. } => 11,
            Error::InvalidRange { .. } => 12,
            Error::MissingOutlierBounds => 13,
            Error::Gateway(_) => 20,
            Error::InvalidQuery(_) => 21,
            Error::Analysis(_) => 30,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Dataset(_) => 62,
            Error::Config(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_)
            | Error::InvalidBucketCount { .. }
            | Error::InvalidRange { .. }
            | Error::MissingOutlierBounds => ErrorCategory::Validation,

            Error::Gateway(_) | Error::InvalidQuery(_) => ErrorCategory::Gateway,

            Error::Analysis(_) => ErrorCategory::Analysis,

            Error::Io(_) | Error::Json(_) | Error::Dataset(_) => ErrorCategory::Io,

            Error::Config(_) => ErrorCategory::Config,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Validation: fixable by the caller, never retried as-is
            Error::Validation(_)
            | Error::InvalidBucketCount { .. }
            | Error::InvalidRange { .. }
            | Error::MissingOutlierBounds => true,

            // Gateway: transient unless the query itself is malformed
            Error::Gateway(_) => true,
            Error::InvalidQuery(_) => false,

            Error::Analysis(_) => false,

            Error::Io(_) => true,
            Error::Json(_) => true,
            Error::Dataset(_) => true,

            Error::Config(_) => true,
        }
    }

    /// Returns the suggested action for automated callers.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Validation(_)
            | Error::InvalidBucketCount { .. }
            | Error::InvalidRange { .. }
            | Error::MissingOutlierBounds => SuggestedAction::FixInput,

            Error::Gateway(_) => SuggestedAction::Retry,
            Error::InvalidQuery(_) => SuggestedAction::Abort,

            Error::Analysis(_) => SuggestedAction::ManualIntervention,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) | Error::Dataset(_) => SuggestedAction::FixInput,

            Error::Config(ConfigError::Validation(_)) => SuggestedAction::ResetConfig,
            Error::Config(_) => SuggestedAction::RunCheck,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Validation(_) => "Check the request parameters and try again.",
            Error::InvalidBucketCount { .. } => {
                "Use a target bucket count of at least 1 (the default is 80)."
            }
            Error::InvalidRange { .. } => {
                "Swap the arguments: the minimum duration must not exceed the maximum."
            }
            Error::MissingOutlierBounds => {
                "Pass --lower and/or --higher, or take them from 'oa-core bounds'."
            }

            Error::Gateway(_) => {
                "The aggregate store could not be reached. Retry once it is available again."
            }
            Error::InvalidQuery(_) => {
                "The aggregate store rejected the query. Report this with the command line used."
            }

            Error::Analysis(_) => {
                "The aggregate store returned inconsistent aggregates. Report this with the dataset."
            }

            Error::Io(_) => "Check that the file exists and is readable, then retry.",
            Error::Json(_) => {
                "Invalid JSON in file. Check syntax with 'jq . <file>' and try again."
            }
            Error::Dataset(_) => {
                "The dataset does not match the expected process-instance layout. Check field names."
            }

            Error::Config(_) => {
                "Run 'oa-core config validate', or regenerate with 'oa-core config default'."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Validation(_) => "Invalid Request",
            Error::InvalidBucketCount { .. } => "Invalid Bucket Count",
            Error::InvalidRange { .. } => "Invalid Duration Range",
            Error::MissingOutlierBounds => "Missing Outlier Bounds",

            Error::Gateway(_) => "Aggregate Store Unavailable",
            Error::InvalidQuery(_) => "Invalid Aggregate Query",

            Error::Analysis(_) => "Analysis Error",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
            Error::Dataset(_) => "Invalid Dataset",

            Error::Config(_) => "Configuration Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for automated callers.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., bucket count, file path).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidBucketCount { count } => {
                context.insert("target_bucket_count".to_string(), serde_json::json!(count));
            }
            Error::InvalidRange { min, max } => {
                context.insert("min".to_string(), serde_json::json!(min));
                context.insert("max".to_string(), serde_json::json!(max));
            }
            Error::Config(config_err) => {
                if let Some(path) = config_err.path() {
                    context.insert(
                        "path".to_string(),
                        serde_json::json!(path.display().to_string()),
                    );
                }
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Validation("test".into()).code(), 10);
        assert_eq!(Error::InvalidBucketCount { count: 0 }.code(), 11);
        assert_eq!(Error::MissingOutlierBounds.code(), 13);
        assert_eq!(Error::Gateway("down".into()).code(), 20);
        assert_eq!(
            Error::Config(ConfigError::NotFound {
                path: PathBuf::from("/x")
            })
            .code(),
            70
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            Error::MissingOutlierBounds.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::InvalidQuery("bad".into()).category(),
            ErrorCategory::Gateway
        );
        assert_eq!(Error::Dataset("bad".into()).category(), ErrorCategory::Io);
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::MissingOutlierBounds.is_recoverable());
        assert!(Error::Gateway("timeout".into()).is_recoverable());
        assert!(!Error::InvalidQuery("bad".into()).is_recoverable());
        assert!(!Error::Analysis("inconsistent counts".into()).is_recoverable());
    }

    #[test]
    fn test_suggested_action() {
        assert_eq!(
            Error::InvalidBucketCount { count: -1 }.suggested_action(),
            SuggestedAction::FixInput
        );
        assert_eq!(
            Error::Gateway("down".into()).suggested_action(),
            SuggestedAction::Retry
        );
        assert_eq!(
            Error::Config(ConfigError::Validation("alpha".into())).suggested_action(),
            SuggestedAction::ResetConfig
        );
    }

    #[test]
    fn test_structured_error_from_error() {
        let err = Error::InvalidBucketCount { count: 0 };
        let structured = StructuredError::from(&err);

        assert_eq!(structured.code, 11);
        assert_eq!(structured.category, ErrorCategory::Validation);
        assert!(structured.recoverable);
        assert_eq!(structured.suggested_action, SuggestedAction::FixInput);
        assert_eq!(
            structured.context.get("target_bucket_count"),
            Some(&serde_json::json!(0))
        );
    }

    #[test]
    fn test_structured_error_carries_config_path() {
        let err = Error::Config(ConfigError::NotFound {
            path: PathBuf::from("/etc/oa/config.json"),
        });
        let structured = StructuredError::from(&err);
        assert_eq!(
            structured.context.get("path"),
            Some(&serde_json::json!("/etc/oa/config.json"))
        );
    }

    #[test]
    fn test_structured_error_json() {
        let structured = StructuredError::from(&Error::MissingOutlierBounds);
        let json = structured.to_json();

        assert!(json.contains(r#""code":13"#));
        assert!(json.contains(r#""category":"validation""#));
        assert!(json.contains(r#""suggested_action":"fix_input""#));
        assert!(!json.contains("context"));
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::InvalidRange {
            min: 10.0,
            max: 5.0,
        };
        let formatted = format_error_human(&err, false);

        assert!(formatted.contains("Invalid Duration Range"));
        assert!(formatted.contains("min 10 exceeds max 5"));
        assert!(formatted.contains("Fix:"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_display_impls() {
        assert_eq!(ErrorCategory::Gateway.to_string(), "gateway");
        assert_eq!(SuggestedAction::FixInput.to_string(), "fix_input");
    }
}

//! Exit codes for the oa-core CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Operational outcomes (parse outcome from code, not output)
//! - 10-19: Caller errors (bad arguments, bad config)
//! - 20-29: Aggregate store and dataset errors
//! - 30: Internal errors (bugs, should be reported)

use oa_common::error::ErrorCategory;
use oa_common::Error;

/// Exit codes for oa-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success: nothing anomalous found
    Clean = 0,

    /// Outliers or significant terms were found
    ResultsFound = 1,

    /// Invalid arguments or request
    ArgsError = 10,

    /// Configuration file missing, malformed or invalid
    ConfigError = 11,

    /// Aggregate store failed or rejected a query
    GatewayError = 20,

    /// Dataset or output I/O failed
    IoError = 21,

    /// Internal error (bug - please report)
    InternalError = 30,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Clean and results-found are both successful runs.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::ResultsFound)
    }

    /// Caller-correctable errors (10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Outcome of a successful command, given whether it produced findings.
    pub fn for_results(found: bool) -> Self {
        if found {
            ExitCode::ResultsFound
        } else {
            ExitCode::Clean
        }
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ResultsFound => "OK_RESULTS",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::GatewayError => "ERR_GATEWAY",
            ExitCode::IoError => "ERR_IO",
            ExitCode::InternalError => "ERR_INTERNAL",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Validation => ExitCode::ArgsError,
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Gateway => ExitCode::GatewayError,
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Analysis => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

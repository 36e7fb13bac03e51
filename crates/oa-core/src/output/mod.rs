//! Command output rendering.
//!
//! Every command produces a report value. JSON output wraps it in a stable
//! envelope; `md` and `summary` render it for humans. Payloads go to
//! stdout, logs and errors to stderr.

pub mod reports;

pub use reports::{
    BoundsReport, ChartReport, ConfigReport, FindingsReport, InstancesReport, IntervalReport,
    TermsReport, VersionReport,
};

use chrono::{DateTime, Utc};
use oa_common::error::{format_error_human, StructuredError};
use oa_common::{Error, OutputFormat, Result, SCHEMA_VERSION};
use serde::Serialize;

/// Human renderings of a report.
pub trait Render {
    /// Markdown document.
    fn markdown(&self) -> String;
    /// One line, no trailing newline.
    fn summary(&self) -> String;
    /// Whether the report carries findings worth a non-zero exit code.
    fn has_results(&self) -> bool {
        false
    }
}

/// JSON envelope around every command payload.
#[derive(Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub schema_version: &'static str,
    pub command: &'a str,
    pub run_id: &'a str,
    pub generated_at: DateTime<Utc>,
    pub data: &'a T,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn new(command: &'a str, run_id: &'a str, data: &'a T) -> Self {
        Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            run_id,
            generated_at: Utc::now(),
            data,
        }
    }
}

/// Render `report` in `format`.
pub fn render<T>(format: OutputFormat, command: &str, run_id: &str, report: &T) -> Result<String>
where
    T: Serialize + Render,
{
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&Envelope::new(
            command, run_id, report,
        ))?),
        OutputFormat::Md => Ok(report.markdown()),
        OutputFormat::Summary => Ok(format!("[{}] {}", run_id, report.summary())),
    }
}

/// Render an error for stderr.
pub fn render_error(format: OutputFormat, command: &str, run_id: &str, err: &Error) -> String {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "command": command,
                "run_id": run_id,
                "generated_at": Utc::now().to_rfc3339(),
                "status": "error",
                "error": StructuredError::from(err),
            });
            serde_json::to_string_pretty(&body)
                .unwrap_or_else(|_| StructuredError::from(err).to_json())
        }
        OutputFormat::Md => format_error_human(err, false),
        OutputFormat::Summary => format!("[{}] {} error: {}", run_id, command, err),
    }
}

/// Markdown table from a header row and body rows.
pub(crate) fn markdown_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!(
        "|{}|\n",
        header.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    ));
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

#![warn(missing_docs)]
//! mpiparity Report - Run Reports
//!
//! Serializable description of a regression run:
//! - JSON (machine-readable, for CI artifacts)
//! - Human (terminal lines, rendered by the CLI)

mod json;
mod report;

pub use json::{generate_json_report, parse_json_report};
pub use report::{
    CaseReport, FailureInfo, Report, ReportConfig, ReportMeta, ReportSummary, RunStatus,
    SCHEMA_VERSION, SystemInfo,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

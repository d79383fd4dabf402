//! Case Executor
//!
//! Runs the regression cases and turns their results into reports.
//!
//! ## Pipeline Overview
//!
//! ```text
//! RunConfiguration
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  launch → extract → compare, one process count at a time
//! └──────┬──────┘
//!        │  CaseResult
//!        ▼
//! ┌─────────────┐
//! │   report    │  Build Report (+ metadata)
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Orchestrator and per-case results
//! - [`report`] - Report building
//! - [`formatting`] - Human-readable output formatting
//! - [`metadata`] - System metadata collection

mod execution;
mod formatting;
mod metadata;
mod report;

// Re-export public API
pub use execution::{CaseResult, Orchestrator, RunObserver, RunSummary};
pub use formatting::{
    SUCCESS_MESSAGE, format_case_line, format_error, format_human_summary, format_running_line,
};
pub use report::{build_case_report, build_failure_info, build_report};

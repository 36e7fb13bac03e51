//! Outlier Analysis Core Library
//!
//! This library provides the flow-node duration outlier analysis engine:
//! - Histogram interval selection and duration charts
//! - Outlier bounds and per-flow-node findings with heat
//! - Significant variable terms among outlier instances
//! - Outlier instance enumeration
//! - The aggregate store gateway the engine reads from
//! - Exit codes, structured logging and output rendering for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod analysis;
pub mod exit_codes;
pub mod gateway;
pub mod logging;
pub mod output;

pub use analysis::{FindingsOptions, OutlierAnalyzer};
pub use gateway::{AggregateStoreGateway, GatewayError, InMemoryGateway};

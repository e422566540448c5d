//! MarketPulse Runner: dashboard orchestration on top of `marketpulse-core`.
//!
//! This crate provides:
//! - TOML dashboard configuration with validated defaults
//! - Provider set built once per process, secrets from the environment
//! - Concurrent fetch pipeline with per-source failure isolation and TTL cache
//! - Derived statistics (changes, correlation, normalization, volatility)
//! - Dashboard report (text / JSON) and table export (CSV / Parquet)

pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod stats;

pub use config::{ConfigError, DashboardConfig};
pub use export::{export, table_to_csv, write_parquet, ExportFormat};
pub use pipeline::{
    Pipeline, PipelineError, PipelineRun, ProviderSet, SourceOutcome, SourceStatus,
};
pub use report::{DashboardReport, SourceReport, SourceState};
pub use stats::{CorrelationMatrix, KeyMetric, NormalizedReading, VolatilityReading};

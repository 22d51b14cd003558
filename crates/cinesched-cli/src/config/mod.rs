//! Application configuration module.
//!
//! Manages the TOML config file: pipeline settings, normalizer and
//! validator thresholds, and per-cinema source overrides.

#[allow(clippy::module_inception)]
mod config;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, PipelineConfig, SourceConfig};

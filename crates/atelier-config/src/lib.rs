#![allow(clippy::must_use_candidate)]

mod duration;
mod env;
mod loader;
pub mod providers;
pub mod store;
pub mod studio;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use providers::*;
pub use store::*;
pub use studio::*;
pub use telemetry::{ExportProtocol, ExporterConfig, LogFormat, TelemetryConfig};

/// Top-level Atelier configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Orchestrator timing and persistence behavior
    #[serde(default)]
    pub studio: StudioConfig,
    /// In-process generation quota
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Durable store for assets, records, feedback and statistics
    #[serde(default)]
    pub store: Option<StoreConfig>,
    /// Provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Model profiles, in display order
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// Logging and OTLP export
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

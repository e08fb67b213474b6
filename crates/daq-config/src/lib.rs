// daq-config - layered configuration for the ingestion worker
//
// Loads configuration from multiple sources with priority:
// 1. Environment variables (highest)
// 2. Config file path from DAQ_CONFIG env var
// 3. Inline config from DAQ_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.daq-worker.toml)
// 5. Built-in defaults (lowest)

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod sources;
mod validation;

pub use sources::load_config;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub opc: OpcConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    pub storage: StorageConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_bus: Option<EventBusConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    /// Load from all sources, applying priority order and running validation.
    pub fn load() -> anyhow::Result<Self> {
        load_config()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validation::validate_config(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcConfig {
    /// Selects the synthetic subscription source instead of a real OPC UA client.
    #[serde(default)]
    pub use_simulator: bool,
}

impl Default for OpcConfig {
    fn default() -> Self {
        Self { use_simulator: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Worker tick period: how often the supervisor forces a time-triggered flush.
    pub flush_interval_seconds: u64,
    /// Pending buffer size that triggers an async flush.
    pub auto_flush_threshold: usize,
    /// Row count per bulk-insert / spool chunk.
    pub max_chunk: usize,
}

impl BatchConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            flush_interval_seconds: 10,
            auto_flush_threshold: 5000,
            max_chunk: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Filesystem directory for the store-and-forward spool; created if absent.
    pub store_forward_path: String,
    /// Spool cap: cleanup trims back to 80% of this once exceeded.
    pub max_local_storage_records: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            store_forward_path: "./spool".to_string(),
            max_local_storage_records: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub connection_string: String,
}

/// Optional external fan-out; surface only, internals are out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

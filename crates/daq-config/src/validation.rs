// Configuration validation — checks required fields are present and
// values are sensible before the worker opens any subscriptions.

use crate::RuntimeConfig;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_batch(&config.batch)?;
    validate_resilience(&config.resilience)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_batch(config: &crate::BatchConfig) -> Result<()> {
    if config.flush_interval_seconds == 0 {
        bail!("batch.flush_interval_seconds must be greater than 0");
    }
    if config.auto_flush_threshold == 0 {
        bail!("batch.auto_flush_threshold must be greater than 0");
    }
    if config.max_chunk == 0 {
        bail!("batch.max_chunk must be greater than 0");
    }
    if config.max_chunk > config.auto_flush_threshold {
        warn!(
            max_chunk = config.max_chunk,
            auto_flush_threshold = config.auto_flush_threshold,
            "batch.max_chunk is larger than batch.auto_flush_threshold; every auto-flush will fit in a single chunk"
        );
    }
    Ok(())
}

fn validate_resilience(config: &crate::ResilienceConfig) -> Result<()> {
    if config.store_forward_path.is_empty() {
        bail!("resilience.store_forward_path must not be empty");
    }
    if config.max_local_storage_records == 0 {
        bail!("resilience.max_local_storage_records must be greater than 0");
    }
    Ok(())
}

fn validate_storage(config: &RuntimeConfig) -> Result<()> {
    if config.storage.connection_string.is_empty() {
        bail!("storage.connection_string is required");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchConfig, OpcConfig, ResilienceConfig, StorageConfig};

    fn base() -> RuntimeConfig {
        RuntimeConfig {
            opc: OpcConfig::default(),
            batch: BatchConfig::default(),
            resilience: ResilienceConfig::default(),
            storage: StorageConfig {
                connection_string: "postgres://localhost/daq".into(),
            },
            event_bus: None,
            logging: crate::LoggingConfig::default(),
        }
    }

    #[test]
    fn default_batch_config_is_valid() {
        assert!(validate_config(&base()).is_ok());
    }

    #[test]
    fn zero_max_chunk_is_rejected() {
        let mut cfg = base();
        cfg.batch.max_chunk = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn missing_connection_string_is_rejected() {
        let mut cfg = base();
        cfg.storage.connection_string.clear();
        assert!(validate_config(&cfg).is_err());
    }
}

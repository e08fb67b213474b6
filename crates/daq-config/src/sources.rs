use anyhow::{Context, Result};
use std::env;
use std::path::Path;

use crate::{BatchConfig, OpcConfig, ResilienceConfig, RuntimeConfig, StorageConfig};

const ENV_PREFIX: &str = "DAQ_";

/// Load configuration from all sources and validate the result.
pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = default_config();

    if let Some(file_config) = load_from_file()? {
        merge_config(&mut config, file_config);
    }

    apply_env_overrides(&mut config)?;

    config.validate()?;

    Ok(config)
}

fn default_config() -> RuntimeConfig {
    RuntimeConfig {
        opc: OpcConfig::default(),
        batch: BatchConfig::default(),
        resilience: ResilienceConfig::default(),
        storage: StorageConfig {
            connection_string: String::new(),
        },
        event_bus: None,
        logging: crate::LoggingConfig::default(),
    }
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var(format!("{ENV_PREFIX}CONFIG")) {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: RuntimeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        return Ok(Some(config));
    }

    if let Ok(content) = env::var(format!("{ENV_PREFIX}CONFIG_CONTENT")) {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from DAQ_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in &["./config.toml", "./.daq-worker.toml"] {
        if Path::new(path).exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {path}"))?;
            let config: RuntimeConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {path}"))?;
            return Ok(Some(config));
        }
    }

    Ok(None)
}

fn merge_config(base: &mut RuntimeConfig, file: RuntimeConfig) {
    base.opc = file.opc;
    base.batch = file.batch;
    base.resilience = file.resilience;
    base.storage = file.storage;
    base.logging = file.logging;
    if file.event_bus.is_some() {
        base.event_bus = file.event_bus;
    }
}

fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<()> {
    if let Some(val) = get_env_bool("OPC_USE_SIMULATOR")? {
        config.opc.use_simulator = val;
    }

    if let Some(val) = get_env_u64("BATCH_FLUSH_INTERVAL_SECONDS")? {
        config.batch.flush_interval_seconds = val;
    }
    if let Some(val) = get_env_usize("BATCH_AUTO_FLUSH_THRESHOLD")? {
        config.batch.auto_flush_threshold = val;
    }
    if let Some(val) = get_env_usize("BATCH_MAX_CHUNK")? {
        config.batch.max_chunk = val;
    }

    if let Some(val) = get_env_string("RESILIENCE_STORE_FORWARD_PATH")? {
        config.resilience.store_forward_path = val;
    }
    if let Some(val) = get_env_usize("RESILIENCE_MAX_LOCAL_STORAGE_RECORDS")? {
        config.resilience.max_local_storage_records = val;
    }

    if let Some(val) = get_env_string("STORAGE_CONNECTION_STRING")? {
        config.storage.connection_string = val;
    }

    if let Some(val) = get_env_string("LOGGING_LOG_LEVEL")? {
        config.logging.log_level = val;
    }

    Ok(())
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

fn get_env_string(suffix: &str) -> Result<Option<String>> {
    match env::var(env_key(suffix)) {
        Ok(v) => Ok(Some(v)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn get_env_bool(suffix: &str) -> Result<Option<bool>> {
    match get_env_string(suffix)? {
        Some(v) => Ok(Some(
            v.parse::<bool>()
                .with_context(|| format!("Invalid boolean for {}", env_key(suffix)))?,
        )),
        None => Ok(None),
    }
}

fn get_env_usize(suffix: &str) -> Result<Option<usize>> {
    match get_env_string(suffix)? {
        Some(v) => Ok(Some(
            v.parse::<usize>()
                .with_context(|| format!("Invalid integer for {}", env_key(suffix)))?,
        )),
        None => Ok(None),
    }
}

fn get_env_u64(suffix: &str) -> Result<Option<u64>> {
    match get_env_string(suffix)? {
        Some(v) => Ok(Some(
            v.parse::<u64>()
                .with_context(|| format!("Invalid integer for {}", env_key(suffix)))?,
        )),
        None => Ok(None),
    }
}

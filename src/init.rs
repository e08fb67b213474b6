//! Process-wide initialization: tracing setup and the pre-flight checks
//! that must pass before the worker loop starts.

use anyhow::{Context, Result};
use daq_config::{LogFormat, RuntimeConfig};
use std::fs;
use std::path::PathBuf;

/// Initialize the global tracing subscriber from `config.logging`.
/// Idempotent: ignores the error if a subscriber is already installed.
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.logging.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let _ = match config.logging.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}

/// Creates the spool directory if absent and proves it's writable. Run at
/// startup so a misconfigured path is a fatal, non-zero-exit error rather
/// than a surprise the first time the sink needs to spool.
pub fn validate_environment(config: &RuntimeConfig) -> Result<()> {
    let spool_path = PathBuf::from(&config.resilience.store_forward_path);

    fs::create_dir_all(&spool_path)
        .with_context(|| format!("failed to create spool directory: {}", spool_path.display()))?;

    let test_file = spool_path.join(".daq-worker-write-test");
    fs::write(&test_file, b"test").with_context(|| {
        format!(
            "spool directory '{}' is not writable, check permissions",
            spool_path.display()
        )
    })?;
    fs::remove_file(&test_file).context("failed to remove spool write-test file")?;

    if !config.opc.use_simulator {
        anyhow::bail!(
            "no OPC UA client transport is bundled with this worker; set opc.useSimulator = true \
             to run against the built-in simulator, or wire a transport implementing \
             daq_subscription::SubscriptionManager"
        );
    }

    Ok(())
}

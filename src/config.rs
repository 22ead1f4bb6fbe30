//! Store configuration: defaults, optional TOML file, `CRYPTARCH_*` environment variables.

use crate::error::StoreError;
use crate::telemetry::{tracing_event_listener, StoreEventListener};

use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CRYPTARCH";

/// Default number of results kept per query when history is not retained.
pub const DEFAULT_HISTORY_WINDOW: usize = 256;

/// Default sleep between non-blocking reads in polling consumers. Must stay well below the
/// producer delay, otherwise consumers release buffered results in bursts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration options for [`Storage`](crate::Storage).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Keep every result for the process lifetime. When false (or when a `put` asks not to
    /// retain), each series is pruned to `history_window` results after every append.
    pub retain_history: bool,
    /// Results kept per series when history is not retained. At least 1.
    pub history_window: usize,
    /// Sleep between non-blocking reads in polling consumer loops.
    pub poll_interval: Duration,
    /// When set, a [`PrometheusSink`](crate::sink::PrometheusSink) with this metric namespace is
    /// registered at construction.
    pub prometheus_namespace: Option<String>,
    /// Structured event hook (forwards to `tracing` by default).
    pub event_listener: Arc<dyn StoreEventListener>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            retain_history: true,
            history_window: DEFAULT_HISTORY_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            prometheus_namespace: None,
            event_listener: tracing_event_listener(),
        }
    }
}

impl StoreConfig {
    /// Loads configuration layered as defaults, then `path` (if given), then `CRYPTARCH_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        load_with_prefix(path, ENV_PREFIX)
    }

    /// Checks construction parameters.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.history_window == 0 {
            return Err(StoreError::Config(
                "history_window must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(StoreError::Config(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Store config as read from file + env. Every field optional for layering.
#[derive(Debug, Default, Deserialize)]
pub struct StoreFileConfig {
    pub retain_history: Option<bool>,
    pub history_window: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub prometheus_namespace: Option<String>,
}

/// Loads configuration using `prefix` for environment overrides.
pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<StoreConfig, StoreError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(StoreError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(File::from(path));
    }

    builder = builder.add_source(
        Environment::with_prefix(prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .ignore_empty(true),
    );

    let partial: StoreFileConfig = builder.build()?.try_deserialize()?;
    let mut config = StoreConfig::default();
    merge_into_store_config(&mut config, &partial);
    config.validate()?;
    Ok(config)
}

/// Merge file/env partial config onto `StoreConfig`. Only overwrites fields that are `Some`.
fn merge_into_store_config(base: &mut StoreConfig, partial: &StoreFileConfig) {
    if let Some(b) = partial.retain_history {
        base.retain_history = b;
    }
    if let Some(n) = partial.history_window {
        base.history_window = n;
    }
    if let Some(ms) = partial.poll_interval_ms {
        base.poll_interval = Duration::from_millis(ms);
    }
    if let Some(ns) = &partial.prometheus_namespace {
        base.prometheus_namespace = Some(ns.clone());
    }
}

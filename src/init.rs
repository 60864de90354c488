use crate::env::{
    env_flag, env_opt, env_parse, LOG_TRANSPORT_BATCH_SIZE_ENV, LOG_TRANSPORT_CHANNEL_BUFFER_ENV,
    LOG_TRANSPORT_FLUSH_MS_ENV, LOG_TRANSPORT_PRODUCER_LEVEL_ENV, LOG_TRANSPORT_STDOUT_ENV,
};
use crate::error::InitError;
use crate::layer::TransportLayer;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the [`TransportLayer`].
///
/// **Fields**
/// - `channel_buffer`: maximum number of records queued before new ones
///   are dropped.
/// - `batch_size`: records handed to each transport per batch dispatch.
/// - `flush_interval`: maximum delay before a partial batch is flushed.
/// - `enable_stdout`: also stack `tracing_subscriber::fmt::Layer`.
/// - `level`: threshold the layer exposes as producer; transports without
///   their own level inherit it on attach.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub enable_stdout: bool,
    pub level: Option<String>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            enable_stdout: true,
            level: Some("info".to_string()),
        }
    }
}

impl LayerConfig {
    /// Defaults overridden by whatever `LOG_TRANSPORT_*` variables are set.
    pub fn from_env() -> Self {
        let defaults = LayerConfig::default();
        Self {
            channel_buffer: env_parse(LOG_TRANSPORT_CHANNEL_BUFFER_ENV, defaults.channel_buffer),
            batch_size: env_parse(LOG_TRANSPORT_BATCH_SIZE_ENV, defaults.batch_size),
            flush_interval: env_opt(LOG_TRANSPORT_FLUSH_MS_ENV)
                .and_then(|ms| ms.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_interval),
            enable_stdout: env_opt(LOG_TRANSPORT_STDOUT_ENV)
                .map(|_| env_flag(LOG_TRANSPORT_STDOUT_ENV))
                .unwrap_or(defaults.enable_stdout),
            level: env_opt(LOG_TRANSPORT_PRODUCER_LEVEL_ENV).or(defaults.level),
        }
    }

    /// Build the layer for `transports` with this configuration.
    pub fn build(&self, transports: Vec<Arc<Transport>>) -> (TransportLayer, JoinHandle<()>) {
        TransportLayer::new(
            transports,
            self.level.clone(),
            self.channel_buffer,
            self.batch_size,
            self.flush_interval,
        )
    }
}

/// Install a global `tracing` subscriber that feeds `transports`.
///
/// **Returns**
/// - the handle of the background flush task;
/// - `Err(InitError::AlreadyInstalled)` if a global subscriber exists.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    transports: Vec<Arc<Transport>>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let (layer, handle) = config.build(transports);

    // Both arms install the same transport layer; the `fmt` layer is only
    // stacked when stdout output is wanted, which changes the type.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(handle)
}

/// Initialize tracing with [`LayerConfig::default`].
pub fn init_tracing(transports: Vec<Arc<Transport>>) -> Result<JoinHandle<()>, InitError> {
    init_tracing_with_config(transports, LayerConfig::default())
}

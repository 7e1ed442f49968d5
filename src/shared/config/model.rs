use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub bus: BusConfig,
    pub dispatch: DispatchConfig,
    pub query: Option<QueryConfig>,
    pub storage: Option<StorageConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub tcp_addr: String,
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the engine worker's mailbox
    pub mailbox_capacity: usize,
    /// Scans allowed to run at once; further queries are rejected as overloaded
    pub max_concurrent_queries: usize,
}

#[derive(Debug, Deserialize)]
pub struct BusConfig {
    /// Messages buffered per channel handle before a publisher has to wait
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    16
}

#[derive(Debug, Deserialize)]
pub struct DispatchConfig {
    pub ack_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct QueryConfig {
    /// Batch size used by clients that do not pick one. Defaults to 500.
    pub default_batch_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Optional JSON-lines file loaded into the in-memory store at startup
    pub seed_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub stdout_level: String,
    pub file_level: String,
}

impl Settings {
    pub fn default_batch_size(&self) -> usize {
        self.query
            .as_ref()
            .and_then(|cfg| cfg.default_batch_size)
            .unwrap_or(500)
    }

    pub fn seed_path(&self) -> Option<&str> {
        self.storage
            .as_ref()
            .and_then(|cfg| cfg.seed_path.as_deref())
    }
}

use std::env;

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    let config_path = env::var("PULSE_CONFIG").unwrap_or_else(|_| "config".to_string());
    load_settings_from(&config_path)
}

pub fn load_settings_from(config_path: &str) -> Result<Settings, config::ConfigError> {
    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(config_path))
        .build()?
        .try_deserialize()?;

    Ok(settings)
}

//! Configuration management for doa-bridge.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::bridge::BridgeSettings;
use crate::cli::Args;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WebSocket server configuration.
    pub server: ServerSection,
    /// Engine control-connection configuration.
    pub engine: EngineSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Engine configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Host on which the engine is running.
    pub host: String,
    /// Port on which the engine's control connection listens.
    pub port: u16,
    /// Per-operation timeout in seconds; `null` disables the bound.
    pub timeout_secs: Option<f64>,
    /// Id of the pooling plug-in instance under client control.
    pub pooling_id: String,
    /// Id of the classification plug-in instance used for startup
    /// discovery.
    pub classification_id: String,
    /// Full path of the pool variable to visualise. When unset, a
    /// monitor plug-in is assumed to live in the pooling plug-in's
    /// namespace and the path is derived from it.
    pub pool_path: Option<String>,
    /// Absolute path of the beamformer selector variable.
    pub beamformer_path: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 33337,
            timeout_secs: Some(5.0),
            pooling_id: "pool".to_string(),
            classification_id: "svm".to_string(),
            pool_path: None,
            beamformer_path: "mha.doachain.post.select".to_string(),
        }
    }
}

impl EngineSection {
    /// The per-operation timeout as a `Duration`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("DOA_BRIDGE_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("DOA_BRIDGE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(host) = std::env::var("DOA_BRIDGE_ENGINE_HOST") {
            self.engine.host = host;
        }

        if let Ok(port) = std::env::var("DOA_BRIDGE_ENGINE_PORT") {
            if let Ok(port) = port.parse() {
                self.engine.port = port;
            }
        }

        if let Ok(level) = std::env::var("DOA_BRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref host) = args.engine_host {
            self.engine.host = host.clone();
        }
        if let Some(port) = args.engine_port {
            self.engine.port = port;
        }
        if let Some(ref id) = args.pooling_id {
            self.engine.pooling_id = id.clone();
        }
        if let Some(ref id) = args.classification_id {
            self.engine.classification_id = id.clone();
        }
        if let Some(ref path) = args.pool_path {
            self.engine.pool_path = Some(path.clone());
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides
        config.apply_env();

        // Apply CLI argument overrides (highest priority)
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        Ok(ServerConfig::new(host.to_string(), self.server.port))
    }

    /// Path settings handed to each new session.
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            pooling_id: self.engine.pooling_id.clone(),
            pool_path: self.engine.pool_path.clone(),
            beamformer_path: self.engine.beamformer_path.clone(),
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
        }
    }
}

impl std::error::Error for ConfigError {}

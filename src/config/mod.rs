//! Configuration module - environment variables and the persisted range config

pub mod range;

pub use range::{RangeConfig, RangeConfigStore, SharedRangeConfig};

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default location of the persisted range config
pub const DEFAULT_SOUND_CONFIG_PATH: &str = "config/orbital-railgun-sounds-server-config.json";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Path of the JSON range config document
    pub sound_config_path: PathBuf,
    /// Bearer token required by admin commands
    pub admin_token: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            sound_config_path: env::var("SOUND_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOUND_CONFIG_PATH)),

            admin_token: env::var("ADMIN_TOKEN").map_err(|_| ConfigError::Missing("ADMIN_TOKEN"))?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Sound range must be a positive number, got {0}")]
    InvalidRadius(f64),

    #[error("Config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

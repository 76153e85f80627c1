use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub gemini_api_key: String,
    pub live_model: String,
    pub log_level: Level,
    pub lessons_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let live_model = std::env::var("LIVE_MODEL")
            .unwrap_or_else(|_| "models/gemini-2.0-flash-exp".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let lessons_path = std::env::var("LESSONS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./lessons"));

        Ok(Self {
            bind_address,
            gemini_api_key,
            live_model,
            log_level,
            lessons_path,
        })
    }
}

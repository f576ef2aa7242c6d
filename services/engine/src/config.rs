//! services/engine/src/config.rs
//!
//! Runtime configuration for the engine, read once at startup.
//!
//! Everything comes from environment variables, with a `.env` file picked up
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Everything the engine needs to know before it can start serving.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store_base_url: String,
    pub cache_db_path: PathBuf,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub analysis_model: String,
    pub speech_voice: String,
    pub allowed_origin: String,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// A `.env` file in the current directory is honored for development,
    /// but never under `cfg(test)` so that tests stay hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Storage Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:4000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let store_base_url =
            std::env::var("STORE_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());

        let cache_db_path = std::env::var("CACHE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./sessions.db"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys ---
        // Optional here so the openapi binary can run without one; the
        // server binary rejects a missing key at startup.
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter Settings ---
        let analysis_model =
            std::env::var("ANALYSIS_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let speech_voice = std::env::var("SPEECH_VOICE").unwrap_or_else(|_| "alloy".to_string());

        let allowed_origin = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            store_base_url,
            cache_db_path,
            log_level,
            openai_api_key,
            analysis_model,
            speech_voice,
            allowed_origin,
        })
    }
}

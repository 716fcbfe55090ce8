//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub grading_model: String,
    pub prompt_model: String,
    pub translation_model: String,
    pub tts_voice: String,
    /// Directory that holds the storage buckets.
    pub storage_root: PathBuf,
    /// URL prefix under which stored files are served.
    pub public_files_url: String,
    pub cors_origin: String,
    pub autosave_seconds: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- AI Function Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let grading_model =
            std::env::var("GRADING_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let prompt_model =
            std::env::var("PROMPT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let translation_model =
            std::env::var("TRANSLATION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let tts_voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());

        // --- Storage and Browser Settings ---
        let storage_root = std::env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./storage"));
        let public_files_url = std::env::var("PUBLIC_FILES_URL")
            .unwrap_or_else(|_| "/storage".to_string())
            .trim_end_matches('/')
            .to_string();
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let autosave_str = std::env::var("AUTOSAVE_SECONDS").unwrap_or_else(|_| "30".to_string());
        let autosave_seconds = autosave_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "AUTOSAVE_SECONDS".to_string(),
                    format!("'{}' is not a positive number of seconds", autosave_str),
                )
            })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            grading_model,
            prompt_model,
            translation_model,
            tts_voice,
            storage_root,
            public_files_url,
            cors_origin,
            autosave_seconds,
        })
    }
}

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_u32_env, parse_u64_env};
use crate::repos::MAX_HISTORY_LIMIT;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// Postgres connection string; the server keeps history in memory when unset.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub migrations_dir: PathBuf,
    pub history_limit: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let history_limit = parse_u64_env("HISTORY_LIMIT", MAX_HISTORY_LIMIT as u64)?;
        if history_limit == 0 || history_limit > MAX_HISTORY_LIMIT as u64 {
            return Err(ConfigError::InvalidConfiguration(format!(
                "HISTORY_LIMIT must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }

        Ok(Self {
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: optional_trimmed_env("DATABASE_URL"),
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 10)?,
            migrations_dir: env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../db/migrations")
                }),
            history_limit: history_limit as usize,
        })
    }
}

/// Loads `.env` from the working directory when present.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}

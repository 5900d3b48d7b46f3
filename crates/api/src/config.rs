//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,

    // Operator API authentication
    pub operator_token: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: env::var("DATABASE_URL").map_err(|_| "DATABASE_URL not set".to_string())?,
            operator_token: env::var("OPERATOR_API_TOKEN")
                .map_err(|_| "OPERATOR_API_TOKEN not set".to_string())?,
        })
    }
}

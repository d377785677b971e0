use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub inference_api_key: String,
    pub inference_base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub max_concurrent_checks: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            inference_api_key: env::var("INFERENCE_API_KEY")
                .context("INFERENCE_API_KEY must be set")?,
            inference_base_url: env::var("INFERENCE_BASE_URL").ok(),
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            max_concurrent_checks: env::var("MAX_CONCURRENT_CHECKS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("MAX_CONCURRENT_CHECKS must be a valid number")?,
        })
    }
}

use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    /// When unset the service runs on the in-memory adapters, which is only
    /// useful for local development and tests.
    pub database_url: Option<String>,
    pub processor_api_url: Option<String>,
    pub processor_api_key: Option<String>,
    pub processor_webhook_secret: String,
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL").ok(),
            processor_api_url: env::var("PROCESSOR_API_URL").ok(),
            processor_api_key: env::var("PROCESSOR_API_KEY").ok(),
            processor_webhook_secret: env::var("PROCESSOR_WEBHOOK_SECRET")?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
        })
    }

    /// The processor is configured only when both the URL and the key are
    /// present; anything less gets the fail-fast disabled gateway.
    pub fn processor_credentials(&self) -> Option<(&str, &str)> {
        match (&self.processor_api_url, &self.processor_api_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }
}

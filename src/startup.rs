//! Pre-serve validation: catch a broken environment before taking traffic.

use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database
    }

    pub fn log(&self) {
        for error in &self.errors {
            tracing::error!("startup validation: {error}");
        }
        if self.is_valid() {
            tracing::info!("startup validation passed");
        }
    }
}

pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {e}"));
    }

    if let Some(pool) = pool {
        if let Err(e) = validate_database(pool).await {
            report.database = false;
            report.errors.push(format!("Database: {e}"));
        }
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.processor_webhook_secret.is_empty() {
        anyhow::bail!("PROCESSOR_WEBHOOK_SECRET is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if let Some(url) = &config.processor_api_url {
        reqwest::Url::parse(url).context("PROCESSOR_API_URL is not a valid URL")?;
    }
    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;
    Ok(())
}

use crate::{FleetError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub dashboard_api_key: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub linear_webhook_secret: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded .env file from: {:?}", path),
            Err(e) => tracing::debug!("No .env file loaded: {}", e),
        }

        let dashboard_api_key = env::var("DASHBOARD_API_KEY").map_err(|_| {
            FleetError::Config("DASHBOARD_API_KEY environment variable is required".to_string())
        })?;

        if dashboard_api_key.trim().is_empty() {
            return Err(FleetError::Config(
                "DASHBOARD_API_KEY cannot be empty".to_string(),
            ));
        }
        if dashboard_api_key.len() < 32 {
            tracing::error!("SECURITY ERROR: DASHBOARD_API_KEY is too short (minimum 32 characters)");
            tracing::error!("Generate a secure key with: openssl rand -hex 32");
            return Err(FleetError::Config(
                "DASHBOARD_API_KEY must be at least 32 characters for security".to_string(),
            ));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let api = ApiConfig {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| FleetError::Config("PORT must be a valid port number".to_string()))?,
            dashboard_api_key,
            allowed_origins,
        };

        let window_ms: u64 = env::var("RATE_LIMIT_WINDOW_MS")
            .unwrap_or_else(|_| "60000".to_string())
            .parse()
            .map_err(|_| FleetError::Config("RATE_LIMIT_WINDOW_MS must be a number".to_string()))?;
        let max_requests: u32 = env::var("RATE_LIMIT_MAX_REQUESTS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| {
                FleetError::Config("RATE_LIMIT_MAX_REQUESTS must be a number".to_string())
            })?;
        if window_ms == 0 {
            return Err(FleetError::Config(
                "RATE_LIMIT_WINDOW_MS must be greater than zero".to_string(),
            ));
        }
        let rate_limit = RateLimitConfig {
            window_ms,
            max_requests,
        };

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".opencode-dashboard")
            });
        let storage = StorageConfig { data_dir };

        let linear_webhook_secret = env::var("LINEAR_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
        if linear_webhook_secret.is_none() {
            tracing::warn!(
                "LINEAR_WEBHOOK_SECRET not set; incoming Linear webhooks will be rejected"
            );
        }
        let webhook = WebhookConfig {
            linear_webhook_secret,
        };

        Ok(Config {
            api,
            rate_limit,
            storage,
            webhook,
        })
    }
}

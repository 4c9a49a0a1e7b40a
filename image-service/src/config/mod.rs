use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_env_parsed, is_production};
use service_core::error::AppError;
use std::env;

const DEFAULT_MAX_UPLOAD_BYTES: &str = "20971520";

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Path prefix for the image routes, e.g. `/api/v1`. Empty mounts them at the root.
    pub prefix: String,
    /// Upper bound on a request body, applied to multipart uploads.
    pub max_upload_bytes: usize,
}

impl ImageConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        let is_prod = is_production();

        Ok(ImageConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("image-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env_parsed("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: get_env_parsed("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            api: ApiConfig {
                prefix: normalize_prefix(&get_env("API_PREFIX", Some("/api/v1"), is_prod)?),
                max_upload_bytes: get_env_parsed(
                    "MAX_UPLOAD_BYTES",
                    DEFAULT_MAX_UPLOAD_BYTES,
                    is_prod,
                )?,
            },
        })
    }
}

/// Force a leading `/` and strip trailing ones; `""` and `"/"` both mean "no prefix".
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

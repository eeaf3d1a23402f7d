//! Configuration loading from files and environment variables.

use config::{Config, Environment, File};

use crate::error::{ServiceError, ServiceResult};

use super::AppConfig;

/// Load configuration from `config.*` (optional) and `INVOICE__*` env vars.
///
/// Provider keys fall back to the conventional `GEMINI_API_KEY` and
/// `GROQ_API_KEY` variables when not set through the prefixed form.
pub fn load_config() -> ServiceResult<AppConfig> {
    let mut config: AppConfig = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("INVOICE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })?;

    if config.gemini.api_key.is_empty() {
        config.gemini.api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    }
    if config.groq.api_key.is_empty() {
        config.groq.api_key = std::env::var("GROQ_API_KEY").unwrap_or_default();
    }

    Ok(config)
}

//! Environment configuration:
//! exactly the enumerated global tunables. Per-chapter tuning is data, not
//! config — it lives in `chapter_kb_configs` rows, never in an env var.

use serde::Deserialize;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub embedding_provider: String,
    pub embedding_model: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub vector_store_path: String,
    pub relational_db_url: String,
    pub queue_url: String,
    pub dev_mode: bool,
    /// Comma-separated in the environment; split for callers that need a
    /// list rather than the raw header value.
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Loads configuration from environment variables, falling back to a
    /// `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            embedding_provider: env_var("EMBEDDING_PROVIDER")?,
            embedding_model: env_var("EMBEDDING_MODEL")?,
            llm_provider: env_var("LLM_PROVIDER")?,
            llm_model: env_var("LLM_MODEL")?,
            vector_store_path: env_var_or("VECTOR_STORE_PATH", "./data/vector_store"),
            relational_db_url: env_var_or("RELATIONAL_DB_URL", "sqlite://./data/app.db"),
            queue_url: env_var_or("QUEUE_URL", "sqlite://./data/queue.db"),
            dev_mode: env_bool_or("DEV_MODE", false)?,
            allowed_origins: env_var_or("ALLOWED_ORIGINS", "")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
    })
}
}

fn env_var(name: &str) -> Result<String, ConfigError> {
env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn env_var_or(name: &str, default: &str) -> String {
env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_bool_or(name: &str, default: bool) -> Result<bool, ConfigError> {
match env::var(name) {
    Err(_) => Ok(default),
    Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidValue(name.to_string(), other.to_string())),
    },
}
}

#[cfg(test)]
mod tests {
use super::*;

#[test]
fn env_var_or_uses_default_when_unset() {
    let val = env_var_or("LP_CONFIG_TEST_NON_EXISTENT_VAR", "default_value");
    assert_eq!(val, "default_value");
}

#[test]
fn env_bool_or_accepts_common_truthy_and_falsy_spellings() {
    std::env::set_var("LP_CONFIG_TEST_BOOL_TRUE", "yes");
    std::env::set_var("LP_CONFIG_TEST_BOOL_FALSE", "0");
    assert!(env_bool_or("LP_CONFIG_TEST_BOOL_TRUE", false).unwrap());
    assert!(!env_bool_or("LP_CONFIG_TEST_BOOL_FALSE", true).unwrap());
    std::env::remove_var("LP_CONFIG_TEST_BOOL_TRUE");
    std::env::remove_var("LP_CONFIG_TEST_BOOL_FALSE");
}

#[test]
fn env_bool_or_rejects_unrecognized_values() {
    std::env::set_var("LP_CONFIG_TEST_BOOL_BAD", "maybe");
    let err = env_bool_or("LP_CONFIG_TEST_BOOL_BAD", false).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue(_, _)));
    std::env::remove_var("LP_CONFIG_TEST_BOOL_BAD");
}
}

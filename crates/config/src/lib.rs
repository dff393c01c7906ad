//! Configuration management for the cold-calling assistant
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (COLD_CALL_ prefix, `__` separator)
//!
//! Thresholds that several crates must agree on live in [`constants`].

pub mod constants;
pub mod prompts;
pub mod settings;

pub use prompts::{render_sales_prompt, ProductConfig, SALES_TEMPLATE};
pub use settings::{
    load_settings, CacheConfig, LearningConfig, LlmSettings, ObservabilityConfig,
    PersistenceBackend, PersistenceConfig, Settings, TurnDetectionConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{cache, endpoints, learning, reply, timeouts, turn_detection};
use crate::prompts::ProductConfig;
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Utterance boundary timing
    #[serde(default)]
    pub turn_detection: TurnDetectionConfig,

    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Adaptive learning
    #[serde(default)]
    pub learning: LearningConfig,

    /// Chat-completion backend
    #[serde(default)]
    pub llm: LlmSettings,

    /// Where stores are persisted
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Product pitched on the calls
    #[serde(default)]
    pub product: ProductConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Pause thresholds for the utterance boundary detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetectionConfig {
    #[serde(default = "default_stutter_ms")]
    pub stutter_threshold_ms: u64,

    #[serde(default = "default_pause_ms")]
    pub pause_threshold_ms: u64,

    #[serde(default = "default_incomplete_timeout_ms")]
    pub incomplete_timeout_ms: u64,
}

fn default_stutter_ms() -> u64 {
    turn_detection::STUTTER_THRESHOLD_MS
}
fn default_pause_ms() -> u64 {
    turn_detection::PAUSE_THRESHOLD_MS
}
fn default_incomplete_timeout_ms() -> u64 {
    turn_detection::INCOMPLETE_TIMEOUT_MS
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        Self {
            stutter_threshold_ms: default_stutter_ms(),
            pause_threshold_ms: default_pause_ms(),
            incomplete_timeout_ms: default_incomplete_timeout_ms(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Disabling the cache changes latency only, never reply content
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_ttl_secs")]
    pub ttl_seconds: u64,

    /// Hits an entry needs to join the frequent set
    #[serde(default = "default_frequent_min_hits")]
    pub frequent_min_hits: u64,

    #[serde(default = "default_frequent_top_n")]
    pub frequent_top_n: usize,
}

fn default_ttl_secs() -> u64 {
    cache::DEFAULT_TTL_SECS
}
fn default_frequent_min_hits() -> u64 {
    cache::FREQUENT_MIN_HITS
}
fn default_frequent_top_n() -> usize {
    cache::FREQUENT_TOP_N
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_ttl_secs(),
            frequent_min_hits: default_frequent_min_hits(),
            frequent_top_n: default_frequent_top_n(),
        }
    }
}

/// Learning thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Consult and feed the adaptive pattern store
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_min_learn_score")]
    pub min_learn_score: u8,

    #[serde(default = "default_max_responses")]
    pub max_responses_per_pattern: usize,

    #[serde(default = "default_insight_min_score")]
    pub insight_min_score: u8,

    #[serde(default = "default_success_min_score")]
    pub success_min_score: u8,
}

fn default_min_learn_score() -> u8 {
    learning::MIN_LEARN_SCORE
}
fn default_max_responses() -> usize {
    learning::MAX_RESPONSES_PER_PATTERN
}
fn default_insight_min_score() -> u8 {
    learning::INSIGHT_MIN_SCORE
}
fn default_success_min_score() -> u8 {
    learning::SUCCESS_MIN_SCORE
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_learn_score: default_min_learn_score(),
            max_responses_per_pattern: default_max_responses(),
            insight_min_score: default_insight_min_score(),
            success_min_score: default_success_min_score(),
        }
    }
}

/// Chat-completion backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Falls back to OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_penalty")]
    pub presence_penalty: f32,

    #[serde(default = "default_penalty")]
    pub frequency_penalty: f32,

    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_llm_endpoint() -> String {
    endpoints::OPENAI_DEFAULT.to_string()
}
fn default_llm_model() -> String {
    std::env::var("OPENAI_MODEL").unwrap_or_else(|_| endpoints::DEFAULT_MODEL.to_string())
}
fn default_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())
}
fn default_max_tokens() -> u32 {
    reply::DEFAULT_MAX_TOKENS
}
fn default_temperature() -> f32 {
    0.8
}
fn default_top_p() -> f32 {
    0.85
}
fn default_penalty() -> f32 {
    0.6
}
fn default_llm_timeout_ms() -> u64 {
    timeouts::LLM_REQUEST_MS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: default_api_key(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            presence_penalty: default_penalty(),
            frequency_penalty: default_penalty(),
            timeout_ms: default_llm_timeout_ms(),
        }
    }
}

/// Storage backend for learned state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// One JSON document per store under `data_dir`
    #[default]
    File,
    /// Process-local, lost on exit
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_turn_detection()?;
        self.validate_cache()?;
        self.validate_learning()?;
        self.validate_llm()?;
        Ok(())
    }

    fn validate_turn_detection(&self) -> Result<(), ConfigError> {
        let td = &self.turn_detection;
        if td.stutter_threshold_ms >= td.pause_threshold_ms {
            return Err(ConfigError::InvalidValue {
                field: "turn_detection.stutter_threshold_ms".to_string(),
                message: format!(
                    "Must be below pause_threshold_ms ({}), got {}",
                    td.pause_threshold_ms, td.stutter_threshold_ms
                ),
            });
        }
        if td.pause_threshold_ms > td.incomplete_timeout_ms {
            return Err(ConfigError::InvalidValue {
                field: "turn_detection.incomplete_timeout_ms".to_string(),
                message: format!(
                    "Must be at least pause_threshold_ms ({}), got {}",
                    td.pause_threshold_ms, td.incomplete_timeout_ms
                ),
            });
        }
        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_seconds".to_string(),
                message: "TTL must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn validate_learning(&self) -> Result<(), ConfigError> {
        let l = &self.learning;
        for (field, value) in [
            ("learning.min_learn_score", l.min_learn_score),
            ("learning.insight_min_score", l.insight_min_score),
            ("learning.success_min_score", l.success_min_score),
        ] {
            if value > 100 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0 and 100, got {}", value),
                });
            }
        }
        if l.max_responses_per_pattern == 0 {
            return Err(ConfigError::InvalidValue {
                field: "learning.max_responses_per_pattern".to_string(),
                message: "Must keep at least one response".to_string(),
            });
        }
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }
        if !(0.0..=1.0).contains(&self.llm.top_p) {
            return Err(ConfigError::InvalidValue {
                field: "llm.top_p".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", self.llm.top_p),
            });
        }
        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env} > config/default > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("COLD_CALL")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

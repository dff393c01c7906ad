//! LLM integration for reply generation
//!
//! Features:
//! - OpenAI-compatible chat-completion backend (no built-in retry)
//! - Prompt building with intent tags and knowledge-base context
//! - Token estimation

pub mod backend;
pub mod prompt;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use prompt::{estimate_tokens, PromptBuilder};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for cold_call_core::Error {
    fn from(err: LlmError) -> Self {
        cold_call_core::Error::Llm(err.to_string())
    }
}

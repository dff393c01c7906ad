//! Cold-calling conversation agent
//!
//! Features:
//! - Input cleaning for Czech STT output and reply cleaning for TTS
//! - Keyword intent classification
//! - Response cache with TTL and hit statistics
//! - Adaptive pattern store of replies ranked by call outcome
//! - Response orchestration (patterns, cache, then the language model)
//! - Outcome learning and cross-call conversation memory
//! - `CallManager` facade tying the above to per-call turn tracking

pub mod cache;
pub mod intent;
pub mod learner;
pub mod manager;
pub mod memory;
pub mod patterns;
pub mod responder;
pub mod text;

pub use cache::{
    processing_hints, CacheContext, CacheEntry, CacheReport, FrequentQuery, ProcessingHints,
    ResponseCache, ResponseCacheConfig,
};
pub use intent::Intent;
pub use learner::{LearningReport, OutcomeLearner};
pub use manager::CallManager;
pub use memory::{
    BestPractices, CallAnalysis, ConversationMemory, ImprovementHint, MemoryConfig, MemoryStats,
};
pub use patterns::{score_quality, AdaptivePatternStore, PatternStats, PatternStoreConfig};
pub use responder::{Reply, ReplySource, ResponderConfig, ResponseOrchestrator};
pub use text::{clean_input, clean_reply};

use cold_call_persistence::PersistenceError;
use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    /// The language model failed; the caller decides whether to retry
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Model returned an empty reply")]
    EmptyReply,

    #[error("Utterance is empty after cleaning")]
    EmptyUtterance,

    #[error("Outcome score {0} is outside 0-100")]
    InvalidScore(u8),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl From<cold_call_pipeline::PipelineError> for AgentError {
    fn from(err: cold_call_pipeline::PipelineError) -> Self {
        AgentError::Pipeline(err.to_string())
    }
}

impl From<AgentError> for cold_call_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Generation(msg) => cold_call_core::Error::Llm(msg),
            AgentError::Persistence(e) => cold_call_core::Error::Persistence(e.to_string()),
            AgentError::Pipeline(msg) => cold_call_core::Error::Config(msg),
            other => cold_call_core::Error::InvalidInput(other.to_string()),
        }
    }
}

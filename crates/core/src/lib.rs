//! Core traits and types for the cold-calling assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Conversation turns and per-call history
//! - LLM request/response types
//! - Pluggable collaborator traits (language model, knowledge base)
//! - A clock abstraction so time-dependent stores can be tested
//! - Error types

pub mod clock;
pub mod conversation;
pub mod error;
pub mod llm_types;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conversation::{ConversationHistory, Turn, TurnRole};
pub use error::{Error, Result};
pub use llm_types::{FinishReason, GenerateRequest, GenerateResponse, Message, Role, TokenUsage};
pub use traits::{KnowledgeSource, LanguageModel};

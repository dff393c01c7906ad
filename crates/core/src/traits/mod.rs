//! Collaborator traits
//!
//! The response pipeline talks to external services only through these
//! traits so backends can be swapped or mocked in tests.

mod knowledge;
mod llm;

pub use knowledge::KnowledgeSource;
pub use llm::LanguageModel;

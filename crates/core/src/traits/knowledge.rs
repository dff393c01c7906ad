//! Knowledge base lookup

use async_trait::async_trait;

use crate::Result;

/// Supplies product facts to embed in the prompt
///
/// Returning `Ok(None)` means nothing relevant was found.
#[async_trait]
pub trait KnowledgeSource: Send + Sync + 'static {
    async fn context_for(&self, query: &str) -> Result<Option<String>>;
}

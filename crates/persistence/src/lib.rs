//! Document persistence for the cold-calling assistant
//!
//! Provides persistent storage for:
//! - Response cache entries and statistics
//! - Learned conversation patterns
//! - Conversation memory buckets and insights
//!
//! Each store is one JSON document. Writes go through a [`Collection`],
//! which serializes flushes so the last write always carries the latest state.

pub mod collection;
pub mod error;
pub mod store;

pub use collection::Collection;
pub use error::PersistenceError;
pub use store::{DocumentStore, JsonFileStore, MemoryStore};

use std::sync::Arc;

use cold_call_config::{PersistenceBackend, PersistenceConfig};

/// Document names used by the assistant stores
pub mod documents {
    pub const RESPONSE_CACHE: &str = "response_cache.json";
    pub const ADAPTIVE_PATTERNS: &str = "adaptive_patterns.json";
    pub const CONVERSATION_MEMORY: &str = "conversation_memory.json";
}

/// Open the document store selected by configuration
pub fn init(config: &PersistenceConfig) -> Arc<dyn DocumentStore> {
    match config.backend {
        PersistenceBackend::File => {
            tracing::info!(data_dir = %config.data_dir, "Using JSON file persistence");
            Arc::new(JsonFileStore::new(&config.data_dir))
        }
        PersistenceBackend::Memory => {
            tracing::info!("Using in-memory persistence");
            Arc::new(MemoryStore::new())
        }
    }
}

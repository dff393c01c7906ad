//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {document}: {source}")]
    Io {
        document: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid document name: {0}")]
    InvalidName(String),
}

impl PersistenceError {
    pub(crate) fn io(document: &str, source: std::io::Error) -> Self {
        Self::Io {
            document: document.to_string(),
            source,
        }
    }
}

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use cold_call_agent::{
    AdaptivePatternStore, ConversationMemory, MemoryConfig, PatternStoreConfig, ResponseCache,
    ResponseCacheConfig,
};
use cold_call_core::{
    Error, GenerateRequest, GenerateResponse, KnowledgeSource, LanguageModel, ManualClock,
};
use cold_call_persistence::{DocumentStore, MemoryStore, PersistenceError};

/// Model that replays canned replies and records every request
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate(&self, request: GenerateRequest) -> cold_call_core::Result<GenerateResponse> {
        self.requests.lock().push(request);
        match self.replies.lock().pop_front() {
            Some(Ok(text)) => Ok(GenerateResponse::text(text)),
            Some(Err(message)) => Err(Error::Llm(message)),
            None => Err(Error::Llm("script exhausted".into())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Knowledge source returning a fixed answer or failing
pub struct StaticKnowledge(pub Option<String>, pub bool);

#[async_trait]
impl KnowledgeSource for StaticKnowledge {
    async fn context_for(&self, _query: &str) -> cold_call_core::Result<Option<String>> {
        if self.1 {
            return Err(Error::Knowledge("index offline".into()));
        }
        Ok(self.0.clone())
    }
}

/// Store that accepts reads but fails every write
pub struct ReadOnlyStore(pub MemoryStore);

#[async_trait]
impl DocumentStore for ReadOnlyStore {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.0.read(name).await
    }

    async fn write(&self, name: &str, _bytes: Vec<u8>) -> Result<(), PersistenceError> {
        Err(PersistenceError::Io {
            document: name.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

pub fn read_only_store() -> Arc<dyn DocumentStore> {
    Arc::new(ReadOnlyStore(MemoryStore::new()))
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
    ))
}

pub fn memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryStore::new())
}

pub async fn cache(store: Arc<dyn DocumentStore>, clock: Arc<ManualClock>) -> Arc<ResponseCache> {
    Arc::new(ResponseCache::open(store, ResponseCacheConfig::default(), clock).await)
}

pub async fn patterns(
    store: Arc<dyn DocumentStore>,
    clock: Arc<ManualClock>,
) -> Arc<AdaptivePatternStore> {
    Arc::new(AdaptivePatternStore::open(store, PatternStoreConfig::default(), clock).await)
}

pub async fn memory(
    store: Arc<dyn DocumentStore>,
    clock: Arc<ManualClock>,
) -> Arc<ConversationMemory> {
    Arc::new(ConversationMemory::open(store, MemoryConfig::default(), clock).await)
}

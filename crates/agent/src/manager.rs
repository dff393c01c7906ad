//! Per-call facade
//!
//! Owns the turn tracker and one history per live call, and routes finished
//! calls to the learner. Stores are shared across calls; histories are not.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use cold_call_config::Settings;
use cold_call_core::{Clock, ConversationHistory, KnowledgeSource, LanguageModel};
use cold_call_persistence::DocumentStore;
use cold_call_pipeline::{CallTurnTracker, DetectorStatus, FragmentDecision, UtteranceDetectorConfig};

use crate::cache::{ResponseCache, ResponseCacheConfig};
use crate::learner::{LearningReport, OutcomeLearner};
use crate::memory::{ConversationMemory, MemoryConfig};
use crate::patterns::{AdaptivePatternStore, PatternStoreConfig};
use crate::responder::{Reply, ResponderConfig, ResponseOrchestrator};
use crate::AgentError;

type SharedHistory = Arc<Mutex<ConversationHistory>>;

pub struct CallManager {
    tracker: CallTurnTracker,
    histories: DashMap<String, SharedHistory>,
    responder: ResponseOrchestrator,
    learner: OutcomeLearner,
}

impl CallManager {
    pub fn new(
        tracker: CallTurnTracker,
        responder: ResponseOrchestrator,
        learner: OutcomeLearner,
    ) -> Self {
        Self {
            tracker,
            histories: DashMap::new(),
            responder,
            learner,
        }
    }

    /// Open the stores named in `settings` and wire them together
    pub async fn from_settings(
        settings: &Settings,
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn LanguageModel>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AgentError> {
        let tracker = CallTurnTracker::new(UtteranceDetectorConfig::from(&settings.turn_detection))?;

        let mut responder = ResponseOrchestrator::new(llm, ResponderConfig::from_settings(settings));

        if settings.cache.enabled {
            let cache = ResponseCache::open(
                store.clone(),
                ResponseCacheConfig::from(&settings.cache),
                clock.clone(),
            )
            .await;
            responder = responder.with_cache(Arc::new(cache));
        }

        let memory = Arc::new(
            ConversationMemory::open(
                store.clone(),
                MemoryConfig::from(&settings.learning),
                clock.clone(),
            )
            .await,
        );
        let mut learner =
            OutcomeLearner::new(memory).with_min_learn_score(settings.learning.min_learn_score);

        if settings.learning.enabled {
            let patterns = Arc::new(
                AdaptivePatternStore::open(
                    store,
                    PatternStoreConfig::from(&settings.learning),
                    clock,
                )
                .await,
            );
            responder = responder.with_patterns(patterns.clone());
            learner = learner.with_patterns(patterns);
        }

        tracing::info!(
            cache = settings.cache.enabled,
            learning = settings.learning.enabled,
            model = %settings.llm.model,
            "Call manager ready"
        );

        Ok(Self::new(tracker, responder, learner))
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeSource>) -> Self {
        self.responder = self.responder.with_knowledge(knowledge);
        self
    }

    /// Feed an STT fragment (or an empty tick) for a call
    pub fn add_fragment(&self, call_id: &str, text: &str, at: Duration) -> FragmentDecision {
        self.tracker.add_fragment(call_id, text, at)
    }

    pub fn turn_status(&self, call_id: &str, now: Duration) -> Option<DetectorStatus> {
        self.tracker.status(call_id, now)
    }

    /// Reply to a completed utterance, recording it in the call history
    pub async fn generate_response(
        &self,
        call_id: &str,
        utterance: &str,
    ) -> Result<Reply, AgentError> {
        let history = self
            .histories
            .entry(call_id.to_string())
            .or_default()
            .clone();
        let mut history = history.lock().await;
        self.responder
            .generate_response(call_id, utterance, &mut history)
            .await
    }

    /// Finish a call and learn from it
    ///
    /// Unfinished speech is discarded. Unknown calls are a no-op.
    pub async fn end_call(
        &self,
        call_id: &str,
        score: u8,
    ) -> Result<Option<LearningReport>, AgentError> {
        self.tracker.discard(call_id);

        let Some((_, history)) = self.histories.remove(call_id) else {
            tracing::debug!(call_id = %call_id, "End of unknown call ignored");
            return Ok(None);
        };

        let history = history.lock().await;
        let report = self.learner.learn_from_call(call_id, &history, score).await?;
        Ok(Some(report))
    }

    /// Snapshot of a live call's history
    pub async fn history(&self, call_id: &str) -> Option<ConversationHistory> {
        let history = self.histories.get(call_id).map(|h| h.value().clone())?;
        let snapshot = history.lock().await.clone();
        Some(snapshot)
    }

    pub fn active_calls(&self) -> usize {
        self.histories.len()
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.responder.cache()
    }

    pub fn patterns(&self) -> Option<&Arc<AdaptivePatternStore>> {
        self.responder.patterns()
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        self.learner.memory()
    }

    /// Write every store
    pub async fn flush(&self) -> Result<(), AgentError> {
        if let Some(cache) = self.cache() {
            cache.flush().await?;
        }
        if let Some(patterns) = self.patterns() {
            patterns.flush().await?;
        }
        self.memory().flush().await?;
        Ok(())
    }
}

//! Outcome learner
//!
//! Runs once per finished call: feeds caller/assistant exchanges into the
//! pattern store and folds the call into conversation memory.

use std::sync::Arc;

use serde::Serialize;

use cold_call_config::constants::learning;
use cold_call_core::ConversationHistory;

use crate::memory::{CallAnalysis, ConversationMemory};
use crate::patterns::AdaptivePatternStore;
use crate::AgentError;

/// Result of learning from one call
#[derive(Debug, Clone, Serialize)]
pub struct LearningReport {
    pub call_id: String,
    pub score: u8,
    /// Exchanges written to the pattern store
    pub patterns_learned: usize,
    pub analysis: CallAnalysis,
}

pub struct OutcomeLearner {
    patterns: Option<Arc<AdaptivePatternStore>>,
    memory: Arc<ConversationMemory>,
    min_learn_score: u8,
}

impl OutcomeLearner {
    pub fn new(memory: Arc<ConversationMemory>) -> Self {
        Self {
            patterns: None,
            memory,
            min_learn_score: learning::MIN_LEARN_SCORE,
        }
    }

    /// Feed exchanges into `patterns`; without a store only memory is updated
    pub fn with_patterns(mut self, patterns: Arc<AdaptivePatternStore>) -> Self {
        self.patterns = Some(patterns);
        self
    }

    pub fn with_min_learn_score(mut self, score: u8) -> Self {
        self.min_learn_score = score;
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    /// Learn from a finished call
    ///
    /// Scores above 100 are rejected. Memory is updated for every score;
    /// exchanges are only learned at or above the learning threshold. Both
    /// steps always run; if either fails to persist, the first error is
    /// returned after both have been attempted.
    pub async fn learn_from_call(
        &self,
        call_id: &str,
        history: &ConversationHistory,
        score: u8,
    ) -> Result<LearningReport, AgentError> {
        if score > 100 {
            return Err(AgentError::InvalidScore(score));
        }

        let recorded = self.memory.record(call_id, history, score).await;

        let learned = match &self.patterns {
            Some(store) if score >= self.min_learn_score => {
                let pairs = history
                    .exchanges()
                    .map(|(caller, assistant)| (caller.content.as_str(), assistant.content.as_str()));
                store.learn_many(pairs, score).await
            }
            Some(_) => {
                tracing::debug!(call_id = %call_id, score, "Score too low, not learning patterns");
                Ok(0)
            }
            None => Ok(0),
        };

        let (analysis, patterns_learned) = match (recorded, learned) {
            (Ok(analysis), Ok(learned)) => (analysis, learned),
            (Ok(_), Err(e)) => {
                tracing::warn!(call_id = %call_id, error = %e, "Failed to store learned patterns");
                return Err(e.into());
            }
            (Err(e), learned) => {
                if let Err(pattern_error) = learned {
                    tracing::warn!(call_id = %call_id, error = %pattern_error, "Failed to store learned patterns");
                }
                tracing::warn!(call_id = %call_id, error = %e, "Failed to store call in memory");
                return Err(e.into());
            }
        };

        tracing::info!(
            call_id = %call_id,
            score,
            patterns_learned,
            bucket = %analysis.bucket,
            "Learned from call"
        );

        Ok(LearningReport {
            call_id: call_id.to_string(),
            score,
            patterns_learned,
            analysis,
        })
    }
}

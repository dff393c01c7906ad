//! Response generation
//!
//! One caller utterance in, one short reply out. Answer sources are tried
//! in order: learned patterns, the response cache, then the language model.
//! A model failure is returned to the caller; there is no fallback once the
//! model has been invoked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use cold_call_config::{render_sales_prompt, LlmSettings, Settings};
use cold_call_core::{ConversationHistory, KnowledgeSource, LanguageModel, Turn};
use cold_call_llm::PromptBuilder;

use crate::cache::{intent_context, processing_hints, CacheContext, ResponseCache};
use crate::intent::Intent;
use crate::patterns::AdaptivePatternStore;
use crate::text::{clean_input, clean_reply};
use crate::AgentError;

/// Where a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Pattern,
    Cache,
    Model,
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplySource::Pattern => "pattern",
            ReplySource::Cache => "cache",
            ReplySource::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub text: String,
    pub intent: Intent,
    pub source: ReplySource,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

mod duration_ms {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Model parameters and prompt for replies
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub system_prompt: String,
    /// Upper bound; intents may ask for fewer tokens
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl ResponderConfig {
    pub fn new(system_prompt: impl Into<String>, llm: &LlmSettings) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            top_p: llm.top_p,
            presence_penalty: llm.presence_penalty,
            frequency_penalty: llm.frequency_penalty,
        }
    }

    /// Sales prompt rendered from the product settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(render_sales_prompt(&settings.product), &settings.llm)
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub struct ResponseOrchestrator {
    llm: Arc<dyn LanguageModel>,
    cache: Option<Arc<ResponseCache>>,
    patterns: Option<Arc<AdaptivePatternStore>>,
    knowledge: Option<Arc<dyn KnowledgeSource>>,
    config: ResponderConfig,
}

impl ResponseOrchestrator {
    pub fn new(llm: Arc<dyn LanguageModel>, config: ResponderConfig) -> Self {
        Self {
            llm,
            cache: None,
            patterns: None,
            knowledge: None,
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_patterns(mut self, patterns: Arc<AdaptivePatternStore>) -> Self {
        self.patterns = Some(patterns);
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeSource>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn patterns(&self) -> Option<&Arc<AdaptivePatternStore>> {
        self.patterns.as_ref()
    }

    /// Produce a reply and append the exchange to `history`
    ///
    /// The history is left untouched when an error is returned.
    pub async fn generate_response(
        &self,
        call_id: &str,
        utterance: &str,
        history: &mut ConversationHistory,
    ) -> Result<Reply, AgentError> {
        let started = Instant::now();

        let cleaned = clean_input(utterance);
        if cleaned.is_empty() {
            return Err(AgentError::EmptyUtterance);
        }
        let intent = Intent::classify(&cleaned);
        let context = intent_context(intent);

        tracing::debug!(call_id = %call_id, intent = %intent, utterance = %cleaned, "Generating reply");

        if let Some(learned) = self.patterns.as_ref().and_then(|p| p.best_response(&cleaned)) {
            metrics::counter!("cold_call_pattern_hits_total").increment(1);
            if let Some(cache) = &self.cache {
                self.remember(call_id, cache, &cleaned, &learned, &context, 0.0).await;
            }
            return Ok(self.finish(call_id, history, &cleaned, intent, learned, ReplySource::Pattern, started));
        }

        if let Some(cache) = &self.cache {
            match cache.get(&cleaned, &context).await {
                Ok(Some(cached)) => {
                    return Ok(self.finish(call_id, history, &cleaned, intent, cached, ReplySource::Cache, started));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(call_id = %call_id, error = %e, "Cache lookup failed, treating as miss");
                }
            }
        }

        let knowledge = self.knowledge_for(call_id, &cleaned).await;
        let max_tokens = processing_hints(intent).max_tokens.min(self.config.max_tokens);
        let request = PromptBuilder::new(self.config.system_prompt.as_str())
            .with_history(history.turns())
            .with_intent(intent.as_str())
            .with_knowledge(knowledge)
            .with_max_tokens(max_tokens)
            .build(&cleaned)
            .with_temperature(self.config.temperature)
            .with_top_p(self.config.top_p)
            .with_penalties(self.config.presence_penalty, self.config.frequency_penalty);

        let generation_started = Instant::now();
        let response = self.llm.generate(request).await.map_err(|e| {
            tracing::warn!(call_id = %call_id, error = %e, model = self.llm.model_name(), "Reply generation failed");
            AgentError::Generation(e.to_string())
        })?;
        let generation_secs = generation_started.elapsed().as_secs_f64();
        tracing::debug!(
            call_id = %call_id,
            completion_tokens = response.usage.as_ref().map_or(0, |u| u.completion_tokens),
            generation_ms = (generation_secs * 1000.0) as u64,
            "Model reply received"
        );

        let text = clean_reply(&response.text);
        if text.is_empty() {
            tracing::warn!(call_id = %call_id, raw = %response.text, "Model returned an empty reply");
            return Err(AgentError::EmptyReply);
        }

        if let Some(cache) = &self.cache {
            if cache.should_cache(&cleaned, intent) {
                self.remember(call_id, cache, &cleaned, &text, &context, generation_secs)
                    .await;
            }
        }

        Ok(self.finish(call_id, history, &cleaned, intent, text, ReplySource::Model, started))
    }

    /// Cache a reply, logging write failures
    async fn remember(
        &self,
        call_id: &str,
        cache: &ResponseCache,
        query: &str,
        reply: &str,
        context: &CacheContext,
        generation_secs: f64,
    ) {
        if let Err(e) = cache.put(query, reply, context, generation_secs).await {
            tracing::warn!(call_id = %call_id, error = %e, "Failed to cache reply, continuing");
        }
    }

    async fn knowledge_for(&self, call_id: &str, query: &str) -> Option<String> {
        let source = self.knowledge.as_ref()?;
        match source.context_for(query).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(call_id = %call_id, error = %e, "Knowledge lookup failed, continuing without it");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        call_id: &str,
        history: &mut ConversationHistory,
        utterance: &str,
        intent: Intent,
        text: String,
        source: ReplySource,
        started: Instant,
    ) -> Reply {
        history.push(Turn::user(utterance).with_intent(intent.as_str()));
        history.push(Turn::assistant(text.as_str()));

        let latency = started.elapsed();
        tracing::info!(
            call_id = %call_id,
            intent = %intent,
            source = source.as_str(),
            latency_ms = latency.as_millis() as u64,
            "Reply ready"
        );

        Reply {
            text,
            intent,
            source,
            latency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cold_call_core::{GenerateRequest, GenerateResponse};
    use parking_lot::Mutex;

    struct EchoLlm {
        requests: Mutex<Vec<GenerateRequest>>,
    }

    #[async_trait]
    impl LanguageModel for EchoLlm {
        async fn generate(
            &self,
            request: GenerateRequest,
        ) -> cold_call_core::Result<GenerateResponse> {
            self.requests.lock().push(request);
            Ok(GenerateResponse::text("**Jasně!!** Web stojí od 8000 Kč 😀"))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_model_reply_is_cleaned_and_recorded() {
        let llm = Arc::new(EchoLlm {
            requests: Mutex::new(Vec::new()),
        });
        let responder = ResponseOrchestrator::new(llm.clone(), ResponderConfig::default());
        let mut history = ConversationHistory::new();

        let reply = responder
            .generate_response("c1", "Kolik  to STOJÍ?", &mut history)
            .await
            .unwrap();

        assert_eq!(reply.source, ReplySource::Model);
        assert_eq!(reply.intent, Intent::Price);
        assert_eq!(reply.text, "Jasně! Web stojí od 8000 Kč");
        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].intent.as_deref(), Some("price"));

        let requests = llm.requests.lock();
        let request = &requests[0];
        assert!(request
            .last_user_message()
            .unwrap()
            .starts_with("[INTENT: price]\n"));
        assert_eq!(request.max_tokens, Some(45));
        assert_eq!(request.temperature, Some(0.8));
    }

    #[tokio::test]
    async fn test_empty_utterance_rejected() {
        let llm = Arc::new(EchoLlm {
            requests: Mutex::new(Vec::new()),
        });
        let responder = ResponseOrchestrator::new(llm.clone(), ResponderConfig::default());
        let mut history = ConversationHistory::new();

        let err = responder
            .generate_response("c1", "   ", &mut history)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyUtterance));
        assert!(history.is_empty());
        assert!(llm.requests.lock().is_empty());
    }
}

//! Prompt building for sales replies
//!
//! The user message sent to the model carries the detected intent and, when
//! the knowledge base returned something, a database block:
//!
//! ```text
//! [INTENT: price]
//! kolik to stojí
//!
//! [INFO Z DATABÁZE]:
//! Web od 8000 Kč.
//! ```

use cold_call_core::{GenerateRequest, Turn};
use unicode_segmentation::UnicodeSegmentation;

/// Prior turns sent along with a new utterance
const MAX_HISTORY_TURNS: usize = 20;

/// Builds a [`GenerateRequest`] for one caller utterance
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    history: Vec<Turn>,
    intent: Option<String>,
    knowledge: Option<String>,
    max_tokens: Option<u32>,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            intent: None,
            knowledge: None,
            max_tokens: None,
        }
    }

    /// Include the most recent turns of the call
    pub fn with_history(mut self, turns: &[Turn]) -> Self {
        let start = turns.len().saturating_sub(MAX_HISTORY_TURNS);
        self.history = turns[start..].to_vec();
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Knowledge-base context; blank text is ignored
    pub fn with_knowledge(mut self, context: Option<String>) -> Self {
        self.knowledge = context.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Build the request for `utterance`
    pub fn build(self, utterance: &str) -> GenerateRequest {
        let message = augmented_message(
            self.intent.as_deref().unwrap_or("unknown"),
            utterance,
            self.knowledge.as_deref(),
        );

        let mut request = GenerateRequest::new(self.system_prompt)
            .with_history(self.history.iter())
            .with_user_message(message);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

/// User message with intent tag and optional database block
pub fn augmented_message(intent: &str, utterance: &str, knowledge: Option<&str>) -> String {
    match knowledge {
        Some(context) => format!(
            "[INTENT: {}]\n{}\n\n[INFO Z DATABÁZE]:\n{}",
            intent, utterance, context
        ),
        None => format!("[INTENT: {}]\n{}", intent, utterance),
    }
}

/// Rough token count, about four graphemes per token
pub fn estimate_tokens(text: &str) -> usize {
    let graphemes = text.graphemes(true).count();
    if graphemes == 0 {
        0
    } else {
        graphemes.div_ceil(4)
    }
}

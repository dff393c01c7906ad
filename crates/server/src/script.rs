//! Canned model replies for offline replays

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use cold_call_core::{Error, GenerateRequest, GenerateResponse, LanguageModel, Result};

/// Language model answering from a fixed list, in order
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    /// One reply per non-empty line
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        ))
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
        self.replies
            .lock()
            .pop_front()
            .map(GenerateResponse::text)
            .ok_or_else(|| Error::Llm("reply script exhausted".into()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

//! Per-call detector registry

use std::time::Duration;

use dashmap::DashMap;

use crate::turn_detection::{
    DetectorStatus, FragmentDecision, UtteranceDetector, UtteranceDetectorConfig,
};
use crate::PipelineError;

/// One [`UtteranceDetector`] per call id
///
/// Buffers are created lazily on the first non-empty fragment and are never
/// shared between calls.
pub struct CallTurnTracker {
    config: UtteranceDetectorConfig,
    calls: DashMap<String, UtteranceDetector>,
}

impl CallTurnTracker {
    pub fn new(config: UtteranceDetectorConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            calls: DashMap::new(),
        })
    }

    /// Feed a fragment for `call_id`
    ///
    /// Fragments for one call must arrive in order.
    pub fn add_fragment(&self, call_id: &str, text: &str, at: Duration) -> FragmentDecision {
        if text.trim().is_empty() {
            if let Some(detector) = self.calls.get(call_id) {
                return detector.add_fragment(text, at);
            }
        }

        let detector = self
            .calls
            .entry(call_id.to_string())
            .or_insert_with(|| UtteranceDetector::new(self.config.clone()));
        let decision = detector.add_fragment(text, at);

        if decision.is_process() {
            tracing::debug!(
                call_id = %call_id,
                tag = decision.tag.map(|t| t.as_str()).unwrap_or_default(),
                chars = decision.text.chars().count(),
                "Utterance boundary"
            );
        }
        decision
    }

    pub fn status(&self, call_id: &str, now: Duration) -> Option<DetectorStatus> {
        self.calls.get(call_id).map(|d| d.status(now))
    }

    pub fn should_wait_for_more(&self, call_id: &str, now: Duration) -> bool {
        self.calls
            .get(call_id)
            .map(|d| d.should_wait_for_more(now))
            .unwrap_or(false)
    }

    /// Drop a call's buffer on hangup; unemitted speech is discarded
    pub fn discard(&self, call_id: &str) -> Option<String> {
        let (_, detector) = self.calls.remove(call_id)?;
        let dropped = detector.reset();
        if !dropped.is_empty() {
            tracing::debug!(call_id = %call_id, chars = dropped.chars().count(), "Discarded buffered speech");
        }
        Some(dropped)
    }

    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }
}

impl Default for CallTurnTracker {
    fn default() -> Self {
        Self {
            config: UtteranceDetectorConfig::default(),
            calls: DashMap::new(),
        }
    }
}

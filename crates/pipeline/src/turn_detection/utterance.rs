//! Utterance boundary detector
//!
//! Buffers STT fragments for one call and classifies the pause before each
//! new fragment:
//! - below `stutter_threshold`: mid-word stutter, keep buffering
//! - below `pause_threshold`: caller is thinking, keep buffering
//! - otherwise: the previous buffer was a finished utterance, emit it
//!
//! Empty fragments are "no speech" ticks from the caller's polling loop. A
//! tick arriving `incomplete_timeout` after the last speech force-flushes the
//! buffer so stuttered speech is never dropped.

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use super::completeness::is_sentence_complete;
use crate::PipelineError;

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    /// No buffered speech
    #[default]
    Empty,
    /// Fragments buffered, utterance not finished yet
    Accumulating,
}

/// What the caller should do after a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentAction {
    /// Keep listening
    Wait,
    /// An utterance is ready for a reply
    Process,
}

/// Why a decision was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryTag {
    Stutter,
    Continuing,
    CompleteSentence,
    Timeout,
}

impl BoundaryTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stutter => "stutter",
            Self::Continuing => "continuing",
            Self::CompleteSentence => "complete_sentence",
            Self::Timeout => "timeout",
        }
    }
}

/// Pause classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseType {
    Stutter,
    Thinking,
    EndOfSentence,
}

/// Result of [`UtteranceDetector::add_fragment`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentDecision {
    pub action: FragmentAction,
    /// Emitted utterance; empty unless `action` is `Process`
    pub text: String,
    pub tag: Option<BoundaryTag>,
    /// Buffer after the fragment was applied
    pub buffer: String,
}

impl FragmentDecision {
    fn wait(tag: Option<BoundaryTag>, buffer: &str) -> Self {
        Self {
            action: FragmentAction::Wait,
            text: String::new(),
            tag,
            buffer: buffer.to_string(),
        }
    }

    fn process(text: String, tag: BoundaryTag, buffer: &str) -> Self {
        Self {
            action: FragmentAction::Process,
            text,
            tag: Some(tag),
            buffer: buffer.to_string(),
        }
    }

    pub fn is_process(&self) -> bool {
        self.action == FragmentAction::Process
    }
}

/// Snapshot of a detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorStatus {
    pub buffer: String,
    /// Buffer length in chars
    pub buffer_length: usize,
    pub time_since_last_input: Option<Duration>,
    pub should_wait: bool,
    pub appears_complete: bool,
}

/// Pause thresholds
#[derive(Debug, Clone)]
pub struct UtteranceDetectorConfig {
    /// Pauses shorter than this are stutter
    pub stutter_threshold: Duration,
    /// Pauses at least this long end an utterance
    pub pause_threshold: Duration,
    /// Silence after which a non-empty buffer is flushed on the next tick
    pub incomplete_timeout: Duration,
}

impl Default for UtteranceDetectorConfig {
    fn default() -> Self {
        use cold_call_config::constants::turn_detection::{
            INCOMPLETE_TIMEOUT_MS, PAUSE_THRESHOLD_MS, STUTTER_THRESHOLD_MS,
        };

        Self {
            stutter_threshold: Duration::from_millis(STUTTER_THRESHOLD_MS),
            pause_threshold: Duration::from_millis(PAUSE_THRESHOLD_MS),
            incomplete_timeout: Duration::from_millis(INCOMPLETE_TIMEOUT_MS),
        }
    }
}

impl From<&cold_call_config::TurnDetectionConfig> for UtteranceDetectorConfig {
    fn from(settings: &cold_call_config::TurnDetectionConfig) -> Self {
        Self {
            stutter_threshold: Duration::from_millis(settings.stutter_threshold_ms),
            pause_threshold: Duration::from_millis(settings.pause_threshold_ms),
            incomplete_timeout: Duration::from_millis(settings.incomplete_timeout_ms),
        }
    }
}

impl UtteranceDetectorConfig {
    /// Thresholds must satisfy stutter < pause <= timeout
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.stutter_threshold >= self.pause_threshold {
            return Err(PipelineError::InvalidConfig(format!(
                "stutter threshold {:?} must be below pause threshold {:?}",
                self.stutter_threshold, self.pause_threshold
            )));
        }
        if self.pause_threshold > self.incomplete_timeout {
            return Err(PipelineError::InvalidConfig(format!(
                "pause threshold {:?} must not exceed incomplete timeout {:?}",
                self.pause_threshold, self.incomplete_timeout
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BufferState {
    buffer: String,
    /// Arrival of the last non-empty fragment; `None` while empty
    last_time: Option<Duration>,
}

/// Utterance boundary detector for a single call
pub struct UtteranceDetector {
    config: UtteranceDetectorConfig,
    internal: Mutex<BufferState>,
}

impl UtteranceDetector {
    pub fn new(config: UtteranceDetectorConfig) -> Self {
        Self {
            config,
            internal: Mutex::new(BufferState::default()),
        }
    }

    pub fn config(&self) -> &UtteranceDetectorConfig {
        &self.config
    }

    /// Feed one fragment arriving at `at` (offset from call start)
    ///
    /// Timestamps must not decrease; an earlier timestamp is treated as a zero pause.
    pub fn add_fragment(&self, text: &str, at: Duration) -> FragmentDecision {
        let fragment = text.trim();
        let mut state = self.internal.lock();

        let Some(last_time) = state.last_time else {
            // First fragment since reset
            if !fragment.is_empty() {
                state.buffer = fragment.to_string();
                state.last_time = Some(at);
            }
            return FragmentDecision::wait(None, &state.buffer);
        };

        let pause = at.saturating_sub(last_time);

        if fragment.is_empty() {
            if pause >= self.config.incomplete_timeout && !state.buffer.is_empty() {
                let emitted = std::mem::take(&mut state.buffer);
                state.last_time = None;
                tracing::debug!(pause_ms = pause.as_millis() as u64, "Incomplete utterance timed out");
                return FragmentDecision::process(emitted, BoundaryTag::Timeout, "");
            }
            return FragmentDecision::wait(None, &state.buffer);
        }

        match self.detect_pause_type(pause) {
            PauseType::Stutter => {
                append(&mut state.buffer, fragment);
                state.last_time = Some(at);
                FragmentDecision::wait(Some(BoundaryTag::Stutter), &state.buffer)
            }
            PauseType::Thinking => {
                append(&mut state.buffer, fragment);
                state.last_time = Some(at);
                FragmentDecision::wait(Some(BoundaryTag::Continuing), &state.buffer)
            }
            PauseType::EndOfSentence => {
                let emitted = std::mem::replace(&mut state.buffer, fragment.to_string());
                state.last_time = Some(at);
                tracing::debug!(pause_ms = pause.as_millis() as u64, "Utterance complete");
                FragmentDecision::process(emitted, BoundaryTag::CompleteSentence, &state.buffer)
            }
        }
    }

    /// Classify a pause against the thresholds
    pub fn detect_pause_type(&self, pause: Duration) -> PauseType {
        if pause < self.config.stutter_threshold {
            PauseType::Stutter
        } else if pause < self.config.pause_threshold {
            PauseType::Thinking
        } else {
            PauseType::EndOfSentence
        }
    }

    /// Whether a caller-side soft timeout should keep waiting at `now`
    ///
    /// False once the buffer is empty or the incomplete timeout has elapsed;
    /// otherwise true while the buffer does not read as a finished sentence.
    pub fn should_wait_for_more(&self, now: Duration) -> bool {
        let state = self.internal.lock();
        Self::should_wait_locked(&self.config, &state, now)
    }

    fn should_wait_locked(
        config: &UtteranceDetectorConfig,
        state: &BufferState,
        now: Duration,
    ) -> bool {
        let Some(last_time) = state.last_time else {
            return false;
        };
        if state.buffer.is_empty() || now.saturating_sub(last_time) >= config.incomplete_timeout {
            return false;
        }
        !is_sentence_complete(&state.buffer)
    }

    /// Snapshot at `now`
    pub fn status(&self, now: Duration) -> DetectorStatus {
        let state = self.internal.lock();
        DetectorStatus {
            buffer: state.buffer.clone(),
            buffer_length: state.buffer.chars().count(),
            time_since_last_input: state.last_time.map(|t| now.saturating_sub(t)),
            should_wait: Self::should_wait_locked(&self.config, &state, now),
            appears_complete: !state.buffer.is_empty() && is_sentence_complete(&state.buffer),
        }
    }

    pub fn state(&self) -> DetectorState {
        if self.internal.lock().buffer.is_empty() {
            DetectorState::Empty
        } else {
            DetectorState::Accumulating
        }
    }

    /// Current buffer
    pub fn buffer(&self) -> String {
        self.internal.lock().buffer.clone()
    }

    /// Drop buffered speech, returning it
    pub fn reset(&self) -> String {
        let mut state = self.internal.lock();
        state.last_time = None;
        std::mem::take(&mut state.buffer)
    }
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new(UtteranceDetectorConfig::default())
    }
}

fn append(buffer: &mut String, fragment: &str) {
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(fragment);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_first_fragment_waits() {
        let detector = UtteranceDetector::default();
        let result = detector.add_fragment("Dobrý", ms(0));
        assert_eq!(result.action, FragmentAction::Wait);
        assert_eq!(result.tag, None);
        assert_eq!(result.buffer, "Dobrý");
        assert_eq!(detector.state(), DetectorState::Accumulating);
    }

    #[test]
    fn test_stutter_fragments_accumulate() {
        let detector = UtteranceDetector::default();
        let fragments = ["já", "já bych", "chtěl", "vědět"];
        for (i, fragment) in fragments.iter().enumerate() {
            let result = detector.add_fragment(fragment, ms(i as u64 * 300));
            assert_eq!(result.action, FragmentAction::Wait);
            if i > 0 {
                assert_eq!(result.tag, Some(BoundaryTag::Stutter));
            }
        }
        assert_eq!(detector.buffer(), fragments.join(" "));
    }

    #[test]
    fn test_thinking_pause_continues() {
        let detector = UtteranceDetector::default();
        detector.add_fragment("no", ms(0));
        let result = detector.add_fragment("možná", ms(1_000));
        assert_eq!(result.tag, Some(BoundaryTag::Continuing));
        assert_eq!(result.buffer, "no možná");
    }

    #[test]
    fn test_long_pause_emits_previous_buffer() {
        let detector = UtteranceDetector::default();
        detector.add_fragment("Dobrý", ms(0));
        detector.add_fragment("den", ms(200));

        let result = detector.add_fragment("kdo volá", ms(2_200));
        assert_eq!(result.action, FragmentAction::Process);
        assert_eq!(result.tag, Some(BoundaryTag::CompleteSentence));
        assert_eq!(result.text, "Dobrý den");
        assert_eq!(result.buffer, "kdo volá");
    }

    #[test]
    fn test_pause_exactly_at_threshold_emits() {
        let detector = UtteranceDetector::default();
        detector.add_fragment("ano", ms(0));
        let result = detector.add_fragment("dobře", ms(1_500));
        assert!(result.is_process());
        assert_eq!(result.text, "ano");
    }

    #[test]
    fn test_timeout_flushes_buffer() {
        let detector = UtteranceDetector::default();
        detector.add_fragment("já", ms(0));
        detector.add_fragment("já", ms(100));

        assert_eq!(detector.add_fragment("", ms(1_000)).action, FragmentAction::Wait);

        let result = detector.add_fragment("", ms(2_100));
        assert_eq!(result.action, FragmentAction::Process);
        assert_eq!(result.tag, Some(BoundaryTag::Timeout));
        assert_eq!(result.text, "já já");
        assert_eq!(detector.state(), DetectorState::Empty);
    }

    #[test]
    fn test_empty_ticks_without_buffer_never_emit() {
        let detector = UtteranceDetector::default();
        for i in 0..10 {
            let result = detector.add_fragment("", ms(i * 5_000));
            assert_eq!(result.action, FragmentAction::Wait);
            assert!(result.text.is_empty());
        }
        assert_eq!(detector.state(), DetectorState::Empty);
    }

    #[test]
    fn test_fragment_after_timeout_starts_fresh() {
        let detector = UtteranceDetector::default();
        detector.add_fragment("haló", ms(0));
        assert!(detector.add_fragment("", ms(2_500)).is_process());

        let result = detector.add_fragment("ano", ms(10_000));
        assert_eq!(result.action, FragmentAction::Wait);
        assert_eq!(result.buffer, "ano");
    }

    #[test]
    fn test_pause_types() {
        let detector = UtteranceDetector::default();
        assert_eq!(detector.detect_pause_type(ms(100)), PauseType::Stutter);
        assert_eq!(detector.detect_pause_type(ms(500)), PauseType::Thinking);
        assert_eq!(detector.detect_pause_type(ms(1_499)), PauseType::Thinking);
        assert_eq!(detector.detect_pause_type(ms(1_500)), PauseType::EndOfSentence);
    }

    #[test]
    fn test_should_wait_for_more() {
        let detector = UtteranceDetector::default();
        assert!(!detector.should_wait_for_more(ms(0)));

        detector.add_fragment("no tak ten", ms(0));
        assert!(detector.should_wait_for_more(ms(500)));
        assert!(!detector.should_wait_for_more(ms(2_000)));

        detector.reset();
        detector.add_fragment("kolik to stojí?", ms(0));
        assert!(!detector.should_wait_for_more(ms(100)));
    }

    #[test]
    fn test_status_snapshot() {
        let detector = UtteranceDetector::default();
        detector.add_fragment("kolik to stojí", ms(1_000));

        let status = detector.status(ms(1_400));
        assert_eq!(status.buffer, "kolik to stojí");
        assert_eq!(status.buffer_length, 14);
        assert_eq!(status.time_since_last_input, Some(ms(400)));
        assert!(status.appears_complete);
        assert!(!status.should_wait);
    }

    #[test]
    fn test_reset_returns_buffer() {
        let detector = UtteranceDetector::default();
        detector.add_fragment("dobrý", ms(0));
        assert_eq!(detector.reset(), "dobrý");
        assert_eq!(detector.state(), DetectorState::Empty);
        assert!(detector.status(ms(10)).time_since_last_input.is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(UtteranceDetectorConfig::default().validate().is_ok());

        let config = UtteranceDetectorConfig {
            stutter_threshold: ms(2_000),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Turn-taking for streamed caller speech
//!
//! This crate decides when a caller has finished speaking:
//! - Utterance boundary detection over timestamped STT fragments
//! - Grammatical completeness heuristic for Czech
//! - Speech-pattern analysis (fluent, hesitant, stuttering)
//! - Per-call tracking so buffers are never shared between calls
//!
//! Timestamps are supplied by the caller as offsets from call start. The
//! detector never reads a clock, so the `incomplete_timeout` is only re-armed
//! by the caller's fragment or tick events.

pub mod tracker;
pub mod turn_detection;

pub use tracker::CallTurnTracker;
pub use turn_detection::{
    analyze_speech_pattern, is_sentence_complete, BoundaryTag, DetectorState, DetectorStatus,
    FragmentAction, FragmentDecision, PauseType, SpeechAnalysis, SpeechConfidence, SpeechPattern,
    UtteranceDetector, UtteranceDetectorConfig,
};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Invalid turn detection config: {0}")]
    InvalidConfig(String),
}

impl From<PipelineError> for cold_call_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidConfig(msg) => cold_call_core::Error::Config(msg),
        }
    }
}

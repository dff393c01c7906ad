//! Utterance boundary detection
//!
//! - `utterance`: fragment buffer state machine (stutter / continuing / complete / timeout)
//! - `completeness`: advisory check whether a buffer reads as a finished sentence
//! - `speech_pattern`: pacing analysis over fragment arrival times

pub mod completeness;
pub mod speech_pattern;
pub mod utterance;

pub use completeness::is_sentence_complete;
pub use speech_pattern::{analyze_speech_pattern, SpeechAnalysis, SpeechConfidence, SpeechPattern};
pub use utterance::{
    BoundaryTag, DetectorState, DetectorStatus, FragmentAction, FragmentDecision, PauseType,
    UtteranceDetector, UtteranceDetectorConfig,
};

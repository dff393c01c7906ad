//! Speech pacing analysis

use std::time::Duration;

use serde::Serialize;

use cold_call_config::constants::turn_detection::{STUTTER_RATIO, VERY_SLOW_PAUSE_MS};

/// Caller pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechPattern {
    Fluent,
    Normal,
    Hesitant,
    VerySlow,
    Stuttering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechConfidence {
    Low,
    High,
}

/// Result of [`analyze_speech_pattern`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpeechAnalysis {
    /// Fewer than two fragments
    InsufficientData,
    Analyzed {
        pattern: SpeechPattern,
        avg_pause: Duration,
        total_pauses: usize,
        short_pauses: usize,
        confidence: SpeechConfidence,
    },
}

/// Classify pacing from fragment arrival times
///
/// The average gap picks fluent / normal / hesitant / very slow; more than
/// 60% of gaps below `stutter_threshold` overrides that with stuttering.
pub fn analyze_speech_pattern(arrivals: &[Duration], stutter_threshold: Duration) -> SpeechAnalysis {
    if arrivals.len() < 2 {
        return SpeechAnalysis::InsufficientData;
    }

    let pauses: Vec<Duration> = arrivals
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0]))
        .collect();

    let total: Duration = pauses.iter().sum();
    let avg_pause = total / pauses.len() as u32;

    let mut pattern = match avg_pause.as_millis() {
        0..=499 => SpeechPattern::Fluent,
        500..=1_499 => SpeechPattern::Normal,
        ms if ms < VERY_SLOW_PAUSE_MS as u128 => SpeechPattern::Hesitant,
        _ => SpeechPattern::VerySlow,
    };

    let short_pauses = pauses.iter().filter(|p| **p < stutter_threshold).count();
    if short_pauses as f64 / pauses.len() as f64 > STUTTER_RATIO {
        pattern = SpeechPattern::Stuttering;
    }

    SpeechAnalysis::Analyzed {
        pattern,
        avg_pause,
        total_pauses: pauses.len(),
        short_pauses,
        confidence: if pauses.len() > 5 {
            SpeechConfidence::High
        } else {
            SpeechConfidence::Low
        },
    }
}

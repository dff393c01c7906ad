//! Transcript replay
//!
//! A transcript is JSON lines, one event per line:
//!
//! ```text
//! {"type":"fragment","call_id":"c1","text":"kolik","at_ms":0}
//! {"type":"tick","call_id":"c1","at_ms":2600}
//! {"type":"end","call_id":"c1","score":85}
//! ```
//!
//! Fragments and ticks go through turn detection; every emitted utterance
//! is answered. A failed reply is reported and the replay continues.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cold_call_agent::{AgentError, CallManager};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    Fragment {
        call_id: String,
        text: String,
        at_ms: u64,
    },
    /// Empty fragment from the polling loop
    Tick { call_id: String, at_ms: u64 },
    End { call_id: String, score: u8 },
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Agent(#[from] AgentError),
}

#[derive(Debug, Default, Serialize)]
pub struct ReplaySummary {
    pub utterances: usize,
    pub replies: usize,
    pub failed_replies: usize,
    pub calls_ended: usize,
    /// Human-readable conversation log
    pub transcript: Vec<String>,
}

/// Parse a transcript, skipping blank lines
pub fn parse_events(input: &str) -> Result<Vec<ReplayEvent>, ReplayError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| ReplayError::Parse { line: i + 1, source })
        })
        .collect()
}

/// Feed events through `manager` in order
pub async fn replay(
    manager: &CallManager,
    events: &[ReplayEvent],
) -> Result<ReplaySummary, ReplayError> {
    let mut summary = ReplaySummary::default();

    for event in events {
        match event {
            ReplayEvent::Fragment { call_id, text, at_ms } => {
                let decision = manager.add_fragment(call_id, text, Duration::from_millis(*at_ms));
                if decision.is_process() {
                    respond(manager, call_id, &decision.text, &mut summary).await?;
                }
            }
            ReplayEvent::Tick { call_id, at_ms } => {
                let decision = manager.add_fragment(call_id, "", Duration::from_millis(*at_ms));
                if decision.is_process() {
                    respond(manager, call_id, &decision.text, &mut summary).await?;
                }
            }
            ReplayEvent::End { call_id, score } => {
                if let Some(report) = manager.end_call(call_id, *score).await? {
                    summary.calls_ended += 1;
                    summary.transcript.push(format!(
                        "[{}] end: score {}, {} patterns learned, bucket {}",
                        call_id, score, report.patterns_learned, report.analysis.bucket
                    ));
                }
            }
        }
    }

    Ok(summary)
}

async fn respond(
    manager: &CallManager,
    call_id: &str,
    utterance: &str,
    summary: &mut ReplaySummary,
) -> Result<(), ReplayError> {
    summary.utterances += 1;
    summary.transcript.push(format!("[{}] caller: {}", call_id, utterance));

    match manager.generate_response(call_id, utterance).await {
        Ok(reply) => {
            summary.replies += 1;
            summary.transcript.push(format!(
                "[{}] agent ({}, {}): {}",
                call_id,
                reply.source.as_str(),
                reply.intent,
                reply.text
            ));
            Ok(())
        }
        Err(AgentError::Generation(message)) => {
            summary.failed_replies += 1;
            tracing::warn!(call_id = %call_id, error = %message, "No reply for utterance");
            summary
                .transcript
                .push(format!("[{}] agent: <no reply: {}>", call_id, message));
            Ok(())
        }
        Err(AgentError::EmptyUtterance) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

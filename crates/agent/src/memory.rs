//! Conversation memory
//!
//! Call-level statistics across all calls: outcome buckets keyed by
//! (outcome, length, objections), plus openings, closings and objection
//! handlers taken from well-scored calls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use cold_call_config::constants::learning;
use cold_call_config::LearningConfig;
use cold_call_core::{Clock, ConversationHistory, TurnRole};
use cold_call_persistence::{documents, Collection, DocumentStore, PersistenceError};

/// Caller phrases treated as objections (matched as lowercase substrings)
pub const OBJECTION_KEYWORDS: &[&str] = &[
    "drahé",
    "drahý",
    "nemám čas",
    "nezájem",
    "nemám zájem",
    "už máme",
    "peníze",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Converted,
    Engaged,
    Declined,
}

impl Outcome {
    pub fn from_score(score: u8) -> Self {
        match score {
            70.. => Outcome::Converted,
            40..=69 => Outcome::Engaged,
            _ => Outcome::Declined,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Converted => "converted",
            Outcome::Engaged => "engaged",
            Outcome::Declined => "declined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallLength {
    Short,
    Medium,
    Long,
}

impl CallLength {
    pub fn from_turns(turns: usize) -> Self {
        match turns {
            0..=4 => CallLength::Short,
            5..=10 => CallLength::Medium,
            _ => CallLength::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallLength::Short => "short",
            CallLength::Medium => "medium",
            CallLength::Long => "long",
        }
    }
}

/// Bucket a call falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketKey {
    pub outcome: Outcome,
    pub length: CallLength,
    pub objections: bool,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.outcome.as_str(),
            self.length.as_str(),
            if self.objections { "with_objections" } else { "smooth" }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExample {
    pub call_id: String,
    pub score: u8,
    pub timestamp: DateTime<Utc>,
    pub turns: usize,
    #[serde(default)]
    pub objections: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub occurrences: u64,
    pub successful: u64,
    pub failed: u64,
    pub avg_score: f64,
    /// Best-scored calls, highest first
    #[serde(default)]
    pub examples: Vec<CallExample>,
}

impl BucketStats {
    pub fn success_rate(&self) -> f64 {
        if self.occurrences == 0 {
            return 0.0;
        }
        self.successful as f64 / self.occurrences as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub score: u8,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub openings: Vec<Snippet>,
    #[serde(default)]
    pub closings: Vec<Snippet>,
    /// Objection keyword to the replies that followed it
    #[serde(default)]
    pub objection_handlers: BTreeMap<String, Vec<Snippet>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MemoryDocument {
    #[serde(default)]
    buckets: BTreeMap<String, BucketStats>,
    #[serde(default)]
    insights: Insights,
}

/// Objection raised by the caller and the assistant turn that followed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandledObjection {
    pub keyword: String,
    pub response: String,
}

/// What [`ConversationMemory::record`] derived from one call
#[derive(Debug, Clone, Serialize)]
pub struct CallAnalysis {
    pub bucket: String,
    pub outcome: Outcome,
    pub turns: usize,
    pub opening: Option<String>,
    pub closing: Option<String>,
    pub objections_raised: Vec<String>,
    pub objections_handled: Vec<HandledObjection>,
}

/// Scan a finished call for its opening, closing and objections
pub fn analyze_call(history: &ConversationHistory, score: u8) -> CallAnalysis {
    let turns = history.turns();
    let mut objections_raised = Vec::new();
    let mut objections_handled = Vec::new();

    for (i, turn) in turns.iter().enumerate() {
        if turn.role != TurnRole::User {
            continue;
        }
        let lowered = turn.content.to_lowercase();
        for keyword in OBJECTION_KEYWORDS.iter().filter(|k| lowered.contains(*k)) {
            objections_raised.push(keyword.to_string());
            // Heuristic: whatever the assistant said next counts as handling it
            if let Some(next) = turns.get(i + 1).filter(|t| t.role == TurnRole::Assistant) {
                objections_handled.push(HandledObjection {
                    keyword: keyword.to_string(),
                    response: clip(&next.content),
                });
            }
        }
    }

    let key = BucketKey {
        outcome: Outcome::from_score(score),
        length: CallLength::from_turns(turns.len()),
        objections: !objections_raised.is_empty(),
    };

    CallAnalysis {
        bucket: key.to_string(),
        outcome: key.outcome,
        turns: turns.len(),
        opening: history.opening().map(|t| clip(&t.content)),
        closing: history.closing().map(|t| clip(&t.content)),
        objections_raised,
        objections_handled,
    }
}

fn clip(text: &str) -> String {
    text.chars().take(learning::SNIPPET_MAX_CHARS).collect()
}

fn push_ranked<T>(list: &mut Vec<T>, item: T, limit: usize, score: impl Fn(&T) -> u8) {
    list.push(item);
    list.sort_by(|a, b| score(b).cmp(&score(a)));
    list.truncate(limit);
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub pattern: String,
    pub occurrences: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub avg_score: f64,
}

impl BucketSummary {
    fn new(pattern: &str, stats: &BucketStats) -> Self {
        Self {
            pattern: pattern.to_string(),
            occurrences: stats.occurrences,
            failed: stats.failed,
            success_rate: stats.success_rate().round(),
            avg_score: (stats.avg_score * 10.0).round() / 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BestPractices {
    pub best_openings: Vec<String>,
    pub best_closings: Vec<String>,
    pub objection_handling: BTreeMap<String, String>,
    pub successful_patterns: Vec<BucketSummary>,
}

/// Recommendation derived from the bucket statistics
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImprovementHint {
    InsufficientData,
    /// Buckets failing more often than not; `examples` holds the first two
    ProblemPatterns { count: usize, examples: Vec<BucketSummary> },
    TopPatterns { patterns: Vec<BucketSummary> },
    ObjectionHandlersLearned { count: usize },
}

impl fmt::Display for ImprovementHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImprovementHint::InsufficientData => {
                write!(f, "Not enough data yet, more calls are needed")
            }
            ImprovementHint::ProblemPatterns { count, examples } => {
                write!(f, "{} problematic conversation patterns", count)?;
                for bucket in examples {
                    write!(
                        f,
                        "\n  - '{}': {}/{} failed",
                        bucket.pattern, bucket.failed, bucket.occurrences
                    )?;
                }
                Ok(())
            }
            ImprovementHint::TopPatterns { patterns } => {
                write!(f, "Most successful patterns:")?;
                for bucket in patterns {
                    write!(f, "\n  - '{}': avg score {:.1}", bucket.pattern, bucket.avg_score)?;
                }
                Ok(())
            }
            ImprovementHint::ObjectionHandlersLearned { count } => {
                write!(f, "{} ways of handling objections learned", count)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub total_patterns: usize,
    pub total_conversations: u64,
    pub successful_conversations: u64,
    /// Percent of calls counted successful
    pub success_rate: f64,
    pub learned_openings: usize,
    pub learned_closings: usize,
    pub objection_types_learned: usize,
}

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub insight_min_score: u8,
    pub success_min_score: u8,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            insight_min_score: learning::INSIGHT_MIN_SCORE,
            success_min_score: learning::SUCCESS_MIN_SCORE,
        }
    }
}

impl From<&LearningConfig> for MemoryConfig {
    fn from(config: &LearningConfig) -> Self {
        Self {
            insight_min_score: config.insight_min_score,
            success_min_score: config.success_min_score,
        }
    }
}

/// Cross-call conversation statistics
pub struct ConversationMemory {
    config: MemoryConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<MemoryDocument>,
    collection: Collection<MemoryDocument>,
}

impl ConversationMemory {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        config: MemoryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let collection = Collection::new(store, documents::CONVERSATION_MEMORY);
        let state: MemoryDocument = collection.load().await;
        tracing::info!(buckets = state.buckets.len(), "Conversation memory loaded");

        Self {
            config,
            clock,
            state: RwLock::new(state),
            collection,
        }
    }

    /// Fold a finished call into the statistics
    pub async fn record(
        &self,
        call_id: &str,
        history: &ConversationHistory,
        score: u8,
    ) -> Result<CallAnalysis, PersistenceError> {
        let analysis = analyze_call(history, score);
        let now = self.clock.now();

        {
            let mut state = self.state.write();

            let bucket = state.buckets.entry(analysis.bucket.clone()).or_default();
            bucket.occurrences += 1;
            if score >= self.config.success_min_score {
                bucket.successful += 1;
            } else {
                bucket.failed += 1;
            }
            bucket.avg_score = (bucket.avg_score * (bucket.occurrences - 1) as f64 + score as f64)
                / bucket.occurrences as f64;
            push_ranked(
                &mut bucket.examples,
                CallExample {
                    call_id: call_id.to_string(),
                    score,
                    timestamp: now,
                    turns: analysis.turns,
                    objections: analysis.objections_raised.clone(),
                },
                learning::MAX_BUCKET_EXAMPLES,
                |e| e.score,
            );

            if score >= self.config.insight_min_score {
                let insights = &mut state.insights;
                let snippet = |text: &str| Snippet {
                    text: text.to_string(),
                    score,
                    timestamp: now,
                };

                if let Some(opening) = analysis.opening.as_deref().filter(|t| !t.is_empty()) {
                    push_ranked(
                        &mut insights.openings,
                        snippet(opening),
                        learning::MAX_OPENINGS,
                        |s| s.score,
                    );
                }
                if let Some(closing) = analysis.closing.as_deref().filter(|t| !t.is_empty()) {
                    push_ranked(
                        &mut insights.closings,
                        snippet(closing),
                        learning::MAX_OPENINGS,
                        |s| s.score,
                    );
                }
                for handled in &analysis.objections_handled {
                    push_ranked(
                        insights
                            .objection_handlers
                            .entry(handled.keyword.clone())
                            .or_default(),
                        snippet(&handled.response),
                        learning::MAX_OBJECTION_HANDLERS,
                        |s| s.score,
                    );
                }
            }
        }

        tracing::info!(
            call_id = %call_id,
            bucket = %analysis.bucket,
            score,
            objections = analysis.objections_raised.len(),
            "Conversation stored"
        );
        self.flush().await?;
        Ok(analysis)
    }

    pub fn best_practices(&self) -> BestPractices {
        let state = self.state.read();
        let insights = &state.insights;

        let mut successful: Vec<(&String, &BucketStats)> = state
            .buckets
            .iter()
            .filter(|(_, b)| b.successful > b.failed && b.occurrences >= 2)
            .collect();
        successful.sort_by(|a, b| b.1.avg_score.total_cmp(&a.1.avg_score));

        BestPractices {
            best_openings: insights.openings.iter().take(3).map(|s| s.text.clone()).collect(),
            best_closings: insights.closings.iter().take(3).map(|s| s.text.clone()).collect(),
            objection_handling: insights
                .objection_handlers
                .iter()
                .filter_map(|(k, handlers)| handlers.first().map(|h| (k.clone(), h.text.clone())))
                .collect(),
            successful_patterns: successful
                .into_iter()
                .take(5)
                .map(|(k, b)| BucketSummary::new(k, b))
                .collect(),
        }
    }

    pub fn improvement_hints(&self) -> Vec<ImprovementHint> {
        let state = self.state.read();
        if state.buckets.is_empty() {
            return vec![ImprovementHint::InsufficientData];
        }

        let mut hints = Vec::new();

        let failing: Vec<BucketSummary> = state
            .buckets
            .iter()
            .filter(|(_, b)| b.failed > b.successful && b.occurrences >= 3)
            .map(|(k, b)| BucketSummary::new(k, b))
            .collect();
        if !failing.is_empty() {
            hints.push(ImprovementHint::ProblemPatterns {
                count: failing.len(),
                examples: failing.into_iter().take(2).collect(),
            });
        }

        let mut top: Vec<(&String, &BucketStats)> = state
            .buckets
            .iter()
            .filter(|(_, b)| b.avg_score > 70.0)
            .collect();
        top.sort_by(|a, b| b.1.avg_score.total_cmp(&a.1.avg_score));
        if !top.is_empty() {
            hints.push(ImprovementHint::TopPatterns {
                patterns: top
                    .into_iter()
                    .take(2)
                    .map(|(k, b)| BucketSummary::new(k, b))
                    .collect(),
            });
        }

        let handlers = state.insights.objection_handlers.len();
        if handlers > 0 {
            hints.push(ImprovementHint::ObjectionHandlersLearned { count: handlers });
        }

        hints
    }

    pub fn stats(&self) -> MemoryStats {
        let state = self.state.read();
        let total_conversations: u64 = state.buckets.values().map(|b| b.occurrences).sum();
        let successful_conversations: u64 = state.buckets.values().map(|b| b.successful).sum();
        let success_rate = if total_conversations > 0 {
            (successful_conversations as f64 / total_conversations as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        MemoryStats {
            total_patterns: state.buckets.len(),
            total_conversations,
            successful_conversations,
            success_rate,
            learned_openings: state.insights.openings.len(),
            learned_closings: state.insights.closings.len(),
            objection_types_learned: state.insights.objection_handlers.len(),
        }
    }

    pub fn bucket(&self, key: &str) -> Option<BucketStats> {
        self.state.read().buckets.get(key).cloned()
    }

    pub fn insights(&self) -> Insights {
        self.state.read().insights.clone()
    }

    pub async fn flush(&self) -> Result<(), PersistenceError> {
        self.collection.save_with(|| self.state.read().clone()).await
    }
}

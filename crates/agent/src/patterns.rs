//! Adaptive pattern store
//!
//! Maps a lossy pattern key (see [`normalize`]) to the best replies seen for
//! it, ranked by call outcome. Used as the first answer source before the
//! cache and the model.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use cold_call_config::constants::learning;
use cold_call_config::LearningConfig;
use cold_call_core::Clock;
use cold_call_persistence::{documents, Collection, DocumentStore, PersistenceError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedResponse {
    pub text: String,
    pub score: u8,
    pub timestamp: DateTime<Utc>,
}

/// Replies for one pattern key, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub responses: Vec<LearnedResponse>,
    /// Mean score of the kept responses
    pub avg_score: f64,
    /// Learning events seen, including dropped responses
    pub count: u64,
}

impl LearnedPattern {
    fn insert(&mut self, response: LearnedResponse, max_responses: usize) {
        self.responses.push(response);
        // Stable: equal scores keep insertion order
        self.responses.sort_by(|a, b| b.score.cmp(&a.score));
        self.responses.truncate(max_responses);
        self.count += 1;
        self.avg_score = self.responses.iter().map(|r| r.score as f64).sum::<f64>()
            / self.responses.len() as f64;
    }

    pub fn best(&self) -> Option<&LearnedResponse> {
        self.responses.first()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternStats {
    pub total_patterns: usize,
    pub total_responses: usize,
    pub avg_pattern_score: f64,
    pub patterns_over_80: usize,
}

/// Pattern store thresholds
#[derive(Debug, Clone)]
pub struct PatternStoreConfig {
    pub min_learn_score: u8,
    pub max_responses: usize,
}

impl Default for PatternStoreConfig {
    fn default() -> Self {
        Self {
            min_learn_score: learning::MIN_LEARN_SCORE,
            max_responses: learning::MAX_RESPONSES_PER_PATTERN,
        }
    }
}

impl From<&LearningConfig> for PatternStoreConfig {
    fn from(config: &LearningConfig) -> Self {
        Self {
            min_learn_score: config.min_learn_score,
            max_responses: config.max_responses_per_pattern,
        }
    }
}

/// Pattern key for an utterance
///
/// Lowercases, drops digits, turns punctuation into spaces and collapses
/// whitespace. Keys longer than 50 chars keep only their first 7 words, so
/// phrasings that differ in numbers or trailing detail collide on purpose.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_numeric())
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let words: Vec<&str> = stripped.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() > learning::PATTERN_KEY_MAX_CHARS {
        words[..words.len().min(learning::PATTERN_KEY_MAX_WORDS)].join(" ")
    } else {
        collapsed
    }
}

const FORMAL_PHRASES: &[&str] = &["děkuji za dotaz", "rádi vám pomůžeme", "těší nás"];
const CONVERSATIONAL_MARKERS: &[&str] = &["jo", "super", "skvělé", "výborně", "jasně"];

/// Heuristic 0-100 quality of a reply
///
/// Rewards 20-100 char replies, questions, concrete numbers and a casual
/// tone; penalizes very short or long replies and stock formal phrases.
pub fn score_quality(response: &str) -> u8 {
    let mut score: i32 = 50;

    let len = response.chars().count();
    if (20..=100).contains(&len) {
        score += 10;
    } else if len < 10 {
        score -= 20;
    } else if len > 150 {
        score -= 10;
    }

    if response.contains('?') {
        score += 15;
    }
    if response.chars().any(char::is_numeric) {
        score += 10;
    }

    let lowered = response.to_lowercase();
    if FORMAL_PHRASES.iter().any(|p| lowered.contains(p)) {
        score -= 15;
    }
    if CONVERSATIONAL_MARKERS.iter().any(|m| lowered.contains(m)) {
        score += 10;
    }

    score.clamp(0, 100) as u8
}

/// Shared store of learned replies
pub struct AdaptivePatternStore {
    config: PatternStoreConfig,
    clock: Arc<dyn Clock>,
    patterns: RwLock<BTreeMap<String, LearnedPattern>>,
    collection: Collection<BTreeMap<String, LearnedPattern>>,
}

impl AdaptivePatternStore {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        config: PatternStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let collection: Collection<BTreeMap<String, LearnedPattern>> = Collection::new(store, documents::ADAPTIVE_PATTERNS);
        let patterns = collection.load().await;
        tracing::info!(patterns = patterns.len(), "Adaptive pattern store loaded");

        Self {
            config,
            clock,
            patterns: RwLock::new(patterns),
            collection,
        }
    }

    /// Record a reply for `question`
    ///
    /// Scores below the learning threshold and questions that normalize to
    /// nothing are ignored. Returns whether the store changed.
    pub async fn learn(
        &self,
        question: &str,
        answer: &str,
        score: u8,
    ) -> Result<bool, PersistenceError> {
        let learned = self.learn_many([(question, answer)], score).await?;
        Ok(learned > 0)
    }

    /// Record several exchanges from one call with a single flush
    pub async fn learn_many<'a, I>(&self, pairs: I, score: u8) -> Result<usize, PersistenceError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if score < self.config.min_learn_score {
            tracing::debug!(score, "Score below learning threshold, skipping");
            return Ok(0);
        }

        let now = self.clock.now();
        let mut learned = 0;
        {
            let mut patterns = self.patterns.write();
            for (question, answer) in pairs {
                let key = normalize(question);
                let answer = answer.trim();
                if key.is_empty() || answer.is_empty() {
                    continue;
                }
                patterns.entry(key).or_default().insert(
                    LearnedResponse {
                        text: answer.to_string(),
                        score,
                        timestamp: now,
                    },
                    self.config.max_responses,
                );
                learned += 1;
            }
        }

        if learned > 0 {
            tracing::debug!(learned, score, "Learned patterns");
            self.flush().await?;
        }
        Ok(learned)
    }

    /// Best learned reply for `query`
    ///
    /// Exact key first, then the stored key sharing the most words with the
    /// query among those overlapping at least half. Ties go to the first key
    /// in sorted order.
    pub fn best_response(&self, query: &str) -> Option<String> {
        let key = normalize(query);
        if key.is_empty() {
            return None;
        }

        let patterns = self.patterns.read();
        if let Some(best) = patterns.get(&key).and_then(LearnedPattern::best) {
            tracing::debug!(key = %key, score = best.score, "Learned response (exact)");
            return Some(best.text.clone());
        }

        let query_words: HashSet<&str> = key.split(' ').collect();
        let mut best: Option<(usize, &LearnedResponse)> = None;

        for (pattern_key, pattern) in patterns.iter() {
            let Some(top) = pattern.best() else {
                continue;
            };
            let pattern_words: HashSet<&str> = pattern_key.split(' ').collect();
            let shared = query_words.intersection(&pattern_words).count();
            let ratio = shared as f64 / query_words.len().max(pattern_words.len()) as f64;

            if ratio >= learning::FUZZY_MIN_OVERLAP
                && best.map_or(true, |(best_shared, _)| shared > best_shared)
            {
                best = Some((shared, top));
            }
        }

        best.map(|(shared, response)| {
            tracing::debug!(key = %key, shared, score = response.score, "Learned response (similar)");
            response.text.clone()
        })
    }

    /// Stored pattern for an utterance
    pub fn pattern(&self, utterance: &str) -> Option<LearnedPattern> {
        self.patterns.read().get(&normalize(utterance)).cloned()
    }

    pub fn stats(&self) -> PatternStats {
        let patterns = self.patterns.read();
        let total_patterns = patterns.len();
        let avg_pattern_score = if total_patterns > 0 {
            let sum: f64 = patterns.values().map(|p| p.avg_score).sum();
            (sum / total_patterns as f64 * 10.0).round() / 10.0
        } else {
            0.0
        };

        PatternStats {
            total_patterns,
            total_responses: patterns.values().map(|p| p.responses.len()).sum(),
            avg_pattern_score,
            patterns_over_80: patterns.values().filter(|p| p.avg_score > 80.0).count(),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn flush(&self) -> Result<(), PersistenceError> {
        self.collection
            .save_with(|| self.patterns.read().clone())
            .await
    }
}

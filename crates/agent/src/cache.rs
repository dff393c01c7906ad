//! Response cache
//!
//! Keyed by a SHA-256 of the normalized query plus its context (sorted keys).
//! Expiry is fixed when an entry is stored; hits only bump `hit_count` and
//! `last_hit`. Stores and hits are written through to the document store;
//! miss counters ride along with the next write.
//!
//! The frequent-query set is part of the stored document. A hit that takes an
//! entry to `frequent_min_hits` re-ranks the set, so it keeps up with traffic
//! and survives restarts and entry expiry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use cold_call_config::constants::{cache as cache_defaults, reply};
use cold_call_config::CacheConfig;
use cold_call_core::Clock;
use cold_call_persistence::{documents, Collection, DocumentStore, PersistenceError};

use crate::intent::Intent;

/// Context attached to a cached query; ordered so keys hash deterministically
pub type CacheContext = BTreeMap<String, String>;

/// Context used by the orchestrator
pub fn intent_context(intent: Intent) -> CacheContext {
    let mut context = CacheContext::new();
    context.insert("intent".to_string(), intent.as_str().to_string());
    context
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub context: CacheContext,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Seconds the original generation took
    pub avg_generation_time: f64,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default)]
    pub last_hit: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Seconds of generation avoided by hits
    pub total_time_saved: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
    #[serde(default)]
    stats: CacheStats,
    /// Normalized queries promoted by the last ranking
    #[serde(default)]
    frequent: BTreeSet<String>,
}

struct Hit {
    response: String,
    saved: f64,
    hit_count: u64,
    query: String,
}

/// Top `frequent_top_n` entries by hits, keeping those with enough hits
fn rank_frequent(document: &mut CacheDocument, config: &ResponseCacheConfig) -> Vec<FrequentQuery> {
    let mut ranked: Vec<FrequentQuery> = document
        .entries
        .values()
        .map(|entry| FrequentQuery {
            query: entry.query.clone(),
            hit_count: entry.hit_count,
        })
        .collect();
    ranked.sort_by(|a, b| b.hit_count.cmp(&a.hit_count));
    ranked.truncate(config.frequent_top_n);
    ranked.retain(|q| q.hit_count >= config.frequent_min_hits);

    document.frequent = ranked.iter().map(|q| normalize_query(&q.query)).collect();
    ranked
}

/// Cache statistics report
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub total_cached: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Percent of lookups that hit
    pub hit_rate: f64,
    pub total_time_saved: f64,
    pub frequent_queries: usize,
}

/// A query promoted by [`ResponseCache::analyze_frequent_queries`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequentQuery {
    pub query: String,
    pub hit_count: u64,
}

/// Processing recommendations for an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingHints {
    pub use_cache: bool,
    pub parallel_kb_lookup: bool,
    pub stream_response: bool,
    pub max_tokens: u32,
}

/// Recommendations for handling an intent
pub fn processing_hints(intent: Intent) -> ProcessingHints {
    let mut hints = ProcessingHints {
        use_cache: false,
        parallel_kb_lookup: false,
        stream_response: false,
        max_tokens: reply::DEFAULT_MAX_TOKENS,
    };

    match intent {
        Intent::Confirmation | Intent::Rejection => {
            hints.use_cache = true;
            hints.max_tokens = reply::SHORT_MAX_TOKENS;
        }
        Intent::Question | Intent::Interest => {
            hints.stream_response = true;
            hints.parallel_kb_lookup = true;
        }
        Intent::Price => {
            hints.use_cache = true;
            hints.parallel_kb_lookup = true;
        }
        _ => {}
    }

    hints
}

/// Lowercased, trimmed query text used for keys and the frequent set
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

fn cache_key(query: &str, context: &CacheContext) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    if !context.is_empty() {
        // BTreeMap serializes with sorted keys
        if let Ok(context_json) = serde_json::to_string(context) {
            hasher.update(context_json.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Cache settings
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    pub ttl: chrono::Duration,
    pub frequent_min_hits: u64,
    pub frequent_top_n: usize,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::seconds(cache_defaults::DEFAULT_TTL_SECS as i64),
            frequent_min_hits: cache_defaults::FREQUENT_MIN_HITS,
            frequent_top_n: cache_defaults::FREQUENT_TOP_N,
        }
    }
}

impl From<&CacheConfig> for ResponseCacheConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl: chrono::Duration::seconds(config.ttl_seconds as i64),
            frequent_min_hits: config.frequent_min_hits,
            frequent_top_n: config.frequent_top_n,
        }
    }
}

/// Shared response cache
pub struct ResponseCache {
    config: ResponseCacheConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheDocument>,
    collection: Collection<CacheDocument>,
}

impl ResponseCache {
    /// Load the cache, dropping entries that already expired
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        config: ResponseCacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let collection = Collection::new(store, documents::RESPONSE_CACHE);
        let mut document: CacheDocument = collection.load().await;

        let now = clock.now();
        let before = document.entries.len();
        document.entries.retain(|_, entry| entry.expires_at > now);
        tracing::info!(
            entries = document.entries.len(),
            expired = before - document.entries.len(),
            frequent = document.frequent.len(),
            "Response cache loaded"
        );

        Self {
            config,
            clock,
            state: RwLock::new(document),
            collection,
        }
    }

    /// Cached response for `query` if present and not expired
    pub async fn get(
        &self,
        query: &str,
        context: &CacheContext,
    ) -> Result<Option<String>, PersistenceError> {
        let key = cache_key(query, context);
        let now = self.clock.now();

        let mut promoted = None;
        let hit = {
            let mut state = self.state.write();
            let found = match state.entries.get_mut(&key) {
                Some(entry) if now < entry.expires_at => {
                    entry.hit_count += 1;
                    entry.last_hit = Some(now);
                    Some(Hit {
                        response: entry.response.clone(),
                        saved: entry.avg_generation_time,
                        hit_count: entry.hit_count,
                        query: normalize_query(&entry.query),
                    })
                }
                _ => None,
            };
            match &found {
                Some(hit) => {
                    state.stats.hits += 1;
                    state.stats.total_time_saved += hit.saved;
                    if hit.hit_count >= self.config.frequent_min_hits
                        && !state.frequent.contains(&hit.query)
                    {
                        promoted = Some(rank_frequent(&mut state, &self.config).len());
                    }
                }
                None => state.stats.misses += 1,
            }
            found
        };

        let Some(hit) = hit else {
            metrics::counter!("cold_call_cache_misses_total").increment(1);
            tracing::debug!(key = %&key[..12], "Cache miss");
            return Ok(None);
        };

        metrics::counter!("cold_call_cache_hits_total").increment(1);
        tracing::debug!(key = %&key[..12], saved_secs = hit.saved, "Cache hit");
        if let Some(frequent) = promoted {
            tracing::info!(query = %hit.query, frequent, "Frequent queries updated");
        }

        self.flush().await?;
        Ok(Some(hit.response))
    }

    /// Store a response; `generation_cost` is in seconds
    pub async fn put(
        &self,
        query: &str,
        response: &str,
        context: &CacheContext,
        generation_cost: f64,
    ) -> Result<(), PersistenceError> {
        let key = cache_key(query, context);
        let now = self.clock.now();
        let entry = CacheEntry {
            query: query.to_string(),
            response: response.to_string(),
            context: context.clone(),
            cached_at: now,
            expires_at: now + self.config.ttl,
            avg_generation_time: generation_cost.max(0.0),
            hit_count: 0,
            last_hit: None,
        };

        self.state.write().entries.insert(key, entry);
        tracing::debug!(query = %query, "Cached response");
        self.flush().await
    }

    /// Remove entries with `expires_at <= now`; returns how many went
    pub async fn purge_expired(&self) -> Result<usize, PersistenceError> {
        let now = self.clock.now();
        let removed = {
            let mut state = self.state.write();
            let before = state.entries.len();
            state.entries.retain(|_, entry| entry.expires_at > now);
            before - state.entries.len()
        };

        if removed > 0 {
            tracing::info!(removed, "Purged expired cache entries");
            self.flush().await?;
        }
        Ok(removed)
    }

    /// Whether replies to this query are worth caching
    ///
    /// Short queries, cacheable intents and previously frequent queries qualify.
    pub fn should_cache(&self, query: &str, intent: Intent) -> bool {
        if query.split_whitespace().count() <= cache_defaults::SHORT_QUERY_TOKENS {
            return true;
        }
        if intent.is_cacheable() {
            return true;
        }
        self.state.read().frequent.contains(&normalize_query(query))
    }

    /// Re-rank the frequent set from current hit counts and store it
    pub async fn analyze_frequent_queries(&self) -> Result<Vec<FrequentQuery>, PersistenceError> {
        let ranked = rank_frequent(&mut self.state.write(), &self.config);
        tracing::info!(frequent = ranked.len(), "Frequent queries analyzed");
        self.flush().await?;
        Ok(ranked)
    }

    pub fn processing_hints(&self, intent: Intent) -> ProcessingHints {
        processing_hints(intent)
    }

    pub fn stats(&self) -> CacheReport {
        let state = self.state.read();
        let total = state.stats.hits + state.stats.misses;
        let hit_rate = if total > 0 {
            state.stats.hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheReport {
            total_cached: state.entries.len(),
            cache_hits: state.stats.hits,
            cache_misses: state.stats.misses,
            hit_rate,
            total_time_saved: state.stats.total_time_saved,
            frequent_queries: state.frequent.len(),
        }
    }

    /// Entry stored for a query, expired or not
    pub fn entry(&self, query: &str, context: &CacheContext) -> Option<CacheEntry> {
        self.state
            .read()
            .entries
            .get(&cache_key(query, context))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the current state
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        self.collection
            .save_with(|| self.state.read().clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cold_call_core::ManualClock;
    use cold_call_persistence::MemoryStore;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        ))
    }

    async fn cache_with(store: Arc<dyn DocumentStore>, clock: Arc<ManualClock>) -> ResponseCache {
        ResponseCache::open(store, ResponseCacheConfig::default(), clock).await
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = cache_with(Arc::new(MemoryStore::new()), clock()).await;
        let ctx = intent_context(Intent::Price);

        assert_eq!(cache.get("Kolik stojí?", &ctx).await.unwrap(), None);
        cache.put("Kolik stojí?", "Od 8000 Kč.", &ctx, 1.2).await.unwrap();

        // Key ignores case and surrounding whitespace
        let hit = cache.get("  kolik STOJÍ? ", &ctx).await.unwrap();
        assert_eq!(hit.as_deref(), Some("Od 8000 Kč."));

        let entry = cache.entry("Kolik stojí?", &ctx).unwrap();
        assert_eq!(entry.hit_count, 1);
        assert!(entry.last_hit.is_some());

        let stats = cache.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert!((stats.hit_rate - 50.0).abs() < 1e-9);
        assert!((stats.total_time_saved - 1.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_context_is_part_of_key() {
        let cache = cache_with(Arc::new(MemoryStore::new()), clock()).await;
        cache
            .put("ano", "Super!", &intent_context(Intent::Confirmation), 0.4)
            .await
            .unwrap();

        assert!(cache
            .get("ano", &intent_context(Intent::Unknown))
            .await
            .unwrap()
            .is_none());
        assert!(cache.get("ano", &CacheContext::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expiry_fixed_at_creation() {
        let clock = clock();
        let cache = cache_with(Arc::new(MemoryStore::new()), clock.clone()).await;
        let ctx = CacheContext::new();
        cache.put("haló", "Dobrý den!", &ctx, 0.5).await.unwrap();
        let expires_at = cache.entry("haló", &ctx).unwrap().expires_at;

        clock.advance(chrono::Duration::minutes(59));
        assert!(cache.get("haló", &ctx).await.unwrap().is_some());
        assert_eq!(cache.entry("haló", &ctx).unwrap().expires_at, expires_at);

        clock.advance(chrono::Duration::minutes(1));
        assert!(cache.get("haló", &ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_and_reload_drop_expired() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let clock = clock();
        let cache = cache_with(store.clone(), clock.clone()).await;
        let ctx = CacheContext::new();

        cache.put("stará", "a", &ctx, 0.5).await.unwrap();
        clock.advance(chrono::Duration::minutes(30));
        cache.put("nová", "b", &ctx, 0.5).await.unwrap();
        clock.advance(chrono::Duration::minutes(31));

        let reopened = cache_with(store, clock.clone()).await;
        assert_eq!(reopened.len(), 1);

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_should_cache_rules() {
        let cache = cache_with(Arc::new(MemoryStore::new()), clock()).await;
        assert!(cache.should_cache("kolik to vyjde", Intent::Price));
        assert!(cache.should_cache("tohle je docela dlouhý dotaz na cenu webu", Intent::Price));
        assert!(!cache.should_cache(
            "a jak byste to udělali s tím naším starým webem",
            Intent::Question
        ));
    }

    #[tokio::test]
    async fn test_third_hit_promotes_frequent_query() {
        let cache = cache_with(Arc::new(MemoryStore::new()), clock()).await;
        let long = "a jak byste to udělali s tím naším starým webem";
        let ctx = intent_context(Intent::Question);
        cache.put(long, "Předěláme ho.", &ctx, 0.8).await.unwrap();
        cache.put("jiný dotaz", "x", &ctx, 0.8).await.unwrap();

        for _ in 0..2 {
            cache.get(long, &ctx).await.unwrap();
        }
        assert!(!cache.should_cache(long, Intent::Question));

        cache.get(long, &ctx).await.unwrap();
        cache.get("jiný dotaz", &ctx).await.unwrap();
        assert!(cache.should_cache(long, Intent::Question));
        assert_eq!(cache.stats().frequent_queries, 1);

        let frequent = cache.analyze_frequent_queries().await.unwrap();
        assert_eq!(
            frequent,
            vec![FrequentQuery {
                query: long.to_string(),
                hit_count: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_frequent_set_survives_restart_and_expiry() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let clock = clock();
        let cache = cache_with(store.clone(), clock.clone()).await;
        let long = "a jak byste to udělali s tím naším starým webem";
        let ctx = intent_context(Intent::Question);
        cache.put(long, "Předěláme ho.", &ctx, 0.8).await.unwrap();
        for _ in 0..3 {
            cache.get(long, &ctx).await.unwrap();
        }

        clock.advance(chrono::Duration::hours(2));
        let reopened = cache_with(store, clock).await;
        assert!(reopened.is_empty());
        assert!(reopened.should_cache(long, Intent::Question));
    }

    #[tokio::test]
    async fn test_miss_does_not_write() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), clock()).await;

        assert!(cache.get("nic", &CacheContext::new()).await.unwrap().is_none());
        assert!(store
            .read(documents::RESPONSE_CACHE)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_stats_survive_restart() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let clock = clock();
        let cache = cache_with(store.clone(), clock.clone()).await;
        cache.get("nic", &CacheContext::new()).await.unwrap();
        cache.flush().await.unwrap();

        let reopened = cache_with(store, clock).await;
        assert_eq!(reopened.stats().cache_misses, 1);
    }

    #[test]
    fn test_processing_hints() {
        let hints = processing_hints(Intent::Confirmation);
        assert!(hints.use_cache);
        assert_eq!(hints.max_tokens, 30);

        let hints = processing_hints(Intent::Question);
        assert!(hints.stream_response && hints.parallel_kb_lookup);
        assert_eq!(hints.max_tokens, 45);

        assert!(processing_hints(Intent::Price).use_cache);
        assert!(!processing_hints(Intent::Unknown).use_cache);
    }
}

//! Concurrent updates to shared stores

mod common;

use std::sync::Arc;

use cold_call_agent::cache::intent_context;
use cold_call_agent::Intent;

use common::{cache, clock, memory_store, patterns};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_hits_are_all_counted() {
    let store = memory_store();
    let clock = clock();
    let cache = cache(store.clone(), clock.clone()).await;
    let ctx = intent_context(Intent::Price);
    cache.put("kolik to stojí", "Od 8000 Kč.", &ctx, 1.0).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = Arc::clone(&cache);
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            cache.get("kolik to stojí", &ctx).await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().as_deref(), Some("Od 8000 Kč."));
    }

    assert_eq!(cache.entry("kolik to stojí", &ctx).unwrap().hit_count, 32);
    assert_eq!(cache.stats().cache_hits, 32);

    let reopened = common::cache(store, clock).await;
    assert_eq!(reopened.entry("kolik to stojí", &ctx).unwrap().hit_count, 32);
    assert_eq!(reopened.stats().cache_hits, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_learning_on_one_key() {
    let store = memory_store();
    let clock = clock();
    let patterns = patterns(store.clone(), clock.clone()).await;

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let patterns = Arc::clone(&patterns);
        handles.push(tokio::spawn(async move {
            patterns
                .learn("Kolik stojí web?", &format!("Odpověď {}", i), 60 + i)
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    let pattern = patterns.pattern("kolik stojí web").unwrap();
    assert_eq!(pattern.count, 8);
    assert_eq!(pattern.responses.len(), 5);
    let scores: Vec<u8> = pattern.responses.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![67, 66, 65, 64, 63]);
    assert!((pattern.avg_score - 65.0).abs() < 1e-9);

    let reopened = common::patterns(store, clock).await;
    assert_eq!(reopened.pattern("kolik stojí web"), Some(pattern));
}

//! Reply orchestration against a scripted model

mod common;

use std::sync::Arc;

use cold_call_agent::{
    cache::intent_context, AgentError, Intent, ReplySource, ResponderConfig, ResponseOrchestrator,
};
use cold_call_core::ConversationHistory;

use common::{cache, clock, memory_store, patterns, ScriptedLlm, StaticKnowledge};

fn responder(llm: Arc<ScriptedLlm>) -> ResponseOrchestrator {
    ResponseOrchestrator::new(llm, ResponderConfig::default())
}

#[tokio::test]
async fn test_learned_pattern_skips_model_and_fills_cache() {
    let clock = clock();
    let store = memory_store();
    let patterns = patterns(store.clone(), clock.clone()).await;
    let cache = cache(store, clock).await;
    patterns
        .learn("Kolik stojí web?", "Od 8000 Kč. Zajímá vás?", 85)
        .await
        .unwrap();

    let llm = ScriptedLlm::new(Vec::<String>::new());
    let responder = responder(llm.clone())
        .with_patterns(patterns)
        .with_cache(cache.clone());
    let mut history = ConversationHistory::new();

    let reply = responder
        .generate_response("c1", "Kolik stojí web?", &mut history)
        .await
        .unwrap();

    assert_eq!(reply.source, ReplySource::Pattern);
    assert_eq!(reply.text, "Od 8000 Kč. Zajímá vás?");
    assert_eq!(llm.calls(), 0);

    let entry = cache
        .entry("kolik stojí web?", &intent_context(Intent::Price))
        .unwrap();
    assert_eq!(entry.response, "Od 8000 Kč. Zajímá vás?");
    assert_eq!(entry.avg_generation_time, 0.0);
}

#[tokio::test]
async fn test_cache_hit_skips_model() {
    let cache = cache(memory_store(), clock()).await;
    cache
        .put("kolik to stojí?", "Od 8000 Kč.", &intent_context(Intent::Price), 1.0)
        .await
        .unwrap();

    let llm = ScriptedLlm::new(Vec::<String>::new());
    let responder = responder(llm.clone()).with_cache(cache.clone());
    let mut history = ConversationHistory::new();

    let reply = responder
        .generate_response("c1", "Kolik  to stojí?", &mut history)
        .await
        .unwrap();

    assert_eq!(reply.source, ReplySource::Cache);
    assert_eq!(reply.text, "Od 8000 Kč.");
    assert_eq!(llm.calls(), 0);
    assert_eq!(cache.stats().cache_hits, 1);
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_model_reply_is_cached_for_next_turn() {
    let cache = cache(memory_store(), clock()).await;
    let llm = ScriptedLlm::new(["Od 8000 Kč!!"]);
    let responder = responder(llm.clone()).with_cache(cache.clone());
    let mut history = ConversationHistory::new();

    let first = responder
        .generate_response("c1", "kolik to stojí", &mut history)
        .await
        .unwrap();
    assert_eq!(first.source, ReplySource::Model);
    assert_eq!(first.text, "Od 8000 Kč!");

    let second = responder
        .generate_response("c2", "Kolik to stojí", &mut ConversationHistory::new())
        .await
        .unwrap();
    assert_eq!(second.source, ReplySource::Cache);
    assert_eq!(second.text, "Od 8000 Kč!");
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_long_question_not_cached() {
    let cache = cache(memory_store(), clock()).await;
    let llm = ScriptedLlm::new(["Funguje to jednoduše. Chcete ukázku?"]);
    let responder = responder(llm.clone()).with_cache(cache.clone());

    let reply = responder
        .generate_response(
            "c1",
            "a já bych se chtěl zeptat jak to u vás funguje",
            &mut ConversationHistory::new(),
        )
        .await
        .unwrap();

    assert_eq!(reply.intent, Intent::Question);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let cache = cache(memory_store(), clock()).await;
    let llm = ScriptedLlm::failing("connection reset");
    let responder = responder(llm).with_cache(cache.clone());
    let mut history = ConversationHistory::new();

    let err = responder
        .generate_response("c1", "kolik to stojí", &mut history)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Generation(ref msg) if msg.contains("connection reset")));
    assert!(history.is_empty());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_reply_that_cleans_to_nothing_is_an_error() {
    let llm = ScriptedLlm::new(["😀 ** ** 👍"]);
    let responder = responder(llm);
    let mut history = ConversationHistory::new();

    let err = responder
        .generate_response("c1", "ano", &mut history)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::EmptyReply));
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_long_reply_cut_to_two_sentences() {
    let long = format!(
        "{}. Druhá věta je taky tady. {}.",
        "První věta je dost dlouhá ".repeat(6).trim(),
        "Třetí věta už se nevejde ".repeat(4).trim()
    );
    let llm = ScriptedLlm::new([long]);
    let reply = responder(llm)
        .generate_response("c1", "co děláte", &mut ConversationHistory::new())
        .await
        .unwrap();

    assert!(reply.text.ends_with("Druhá věta je taky tady."));
    assert!(!reply.text.contains("Třetí"));
}

#[tokio::test]
async fn test_prompt_carries_intent_knowledge_and_history() {
    let llm = ScriptedLlm::new(["Dobrý den!", "Web od 8000 Kč."]);
    let responder = responder(llm.clone()).with_knowledge(Arc::new(StaticKnowledge(
        Some("Web od 8000 Kč, e-shop od 15000 Kč.".into()),
        false,
    )));
    let mut history = ConversationHistory::new();

    responder
        .generate_response("c1", "dobrý den", &mut history)
        .await
        .unwrap();
    responder
        .generate_response("c1", "kolik stojí eshop", &mut history)
        .await
        .unwrap();

    let requests = llm.requests.lock();
    let second = &requests[1];
    // system, two history turns, new user message
    assert_eq!(second.messages.len(), 4);
    assert_eq!(
        second.last_user_message(),
        Some("[INTENT: price]\nkolik stojí eshop\n\n[INFO Z DATABÁZE]:\nWeb od 8000 Kč, e-shop od 15000 Kč.")
    );
}

#[tokio::test]
async fn test_knowledge_failure_is_not_fatal() {
    let llm = ScriptedLlm::new(["Jasně, ozvu se."]);
    let responder =
        responder(llm.clone()).with_knowledge(Arc::new(StaticKnowledge(None, true)));

    let reply = responder
        .generate_response("c1", "ano", &mut ConversationHistory::new())
        .await
        .unwrap();

    assert_eq!(reply.source, ReplySource::Model);
    assert_eq!(reply.intent, Intent::Confirmation);
    let requests = llm.requests.lock();
    assert_eq!(requests[0].last_user_message(), Some("[INTENT: confirmation]\nano"));
    assert_eq!(requests[0].max_tokens, Some(30));
}

#[tokio::test]
async fn test_cache_does_not_change_reply_content() {
    let utterances = ["Kolik stojí web?", "A jak dlouho by to trvalo?", "Dobře, ano"];
    let replies = [
        "Od 8000 Kč!! Zajímá vás to?",
        "**Zhruba** dva týdny. Záleží na rozsahu. A pak ještě ladíme detaily.",
        "Super, pošlu vám nabídku.",
    ];

    let plain_llm = ScriptedLlm::new(replies);
    let plain = responder(plain_llm.clone());
    let cached_llm = ScriptedLlm::new(replies);
    let cached = responder(cached_llm.clone()).with_cache(cache(memory_store(), clock()).await);

    let mut plain_history = ConversationHistory::new();
    let mut cached_history = ConversationHistory::new();
    for utterance in utterances {
        let without_cache = plain
            .generate_response("c1", utterance, &mut plain_history)
            .await
            .unwrap();
        let with_cache = cached
            .generate_response("c1", utterance, &mut cached_history)
            .await
            .unwrap();

        assert_eq!(with_cache.source, ReplySource::Model);
        assert_eq!(without_cache.text, with_cache.text);
        assert_eq!(without_cache.intent, with_cache.intent);
    }

    let contents = |history: &ConversationHistory| -> Vec<String> {
        history.turns().iter().map(|t| t.content.clone()).collect()
    };
    assert_eq!(contents(&plain_history), contents(&cached_history));
    assert_eq!(
        plain_llm.requests.lock()[2].messages,
        cached_llm.requests.lock()[2].messages
    );
}

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use super::{interpreter_with, pattern_interpreter, sample_vocabulary, StubCompletion};
use crate::completion::{CompletionClient, CompletionError, CompletionRequest};
use crate::errors::EngineError;
use crate::query::{QueryInterpreter, StaticTables};
use crate::vocabulary::{FileProvider, VocabularyDocument, VocabularyStore};

const FALLBACK_REPLY: &str =
    r#"{"markets": ["UK"], "channels": ["Facebook"], "partners": ["sutra"]}"#;

#[tokio::test]
async fn test_pattern_match_skips_fallback() {
    let client = StubCompletion::replying(FALLBACK_REPLY);
    let interpreter = interpreter_with(client.clone());

    let parsed = interpreter.parse("DE Native Push").await;

    assert_eq!(client.calls(), 0);
    assert_eq!(parsed.markets().unwrap().len(), 1);
    assert!(parsed.partners().is_none());
}

#[tokio::test]
async fn test_fallback_used_when_pattern_finds_nothing() {
    let client = StubCompletion::replying(FALLBACK_REPLY);
    let interpreter = interpreter_with(client.clone());

    let parsed = interpreter.parse("offers in britain via meta").await;

    assert_eq!(client.calls(), 1);
    assert!(parsed.markets().unwrap().contains("UK"));
    assert!(parsed.channels().unwrap().contains("Facebook"));
    assert_eq!(parsed.partners(), Some(&["Sutra".to_string()][..]));
}

#[tokio::test]
async fn test_pattern_result_is_not_augmented() {
    // "Facebook" is recognized, so the fallback never gets to add the market
    let client = StubCompletion::replying(FALLBACK_REPLY);
    let interpreter = interpreter_with(client.clone());

    let parsed = interpreter.parse("Britain Facebook").await;

    assert_eq!(client.calls(), 0);
    assert!(parsed.markets().is_none());
    assert!(parsed.channels().unwrap().contains("Facebook"));
}

#[tokio::test]
async fn test_fallback_failure_yields_empty() {
    let client = StubCompletion::failing();
    let interpreter = interpreter_with(client.clone());

    let parsed = interpreter.parse("something vague").await;

    assert_eq!(client.calls(), 1);
    assert!(parsed.is_empty());
}

#[tokio::test]
async fn test_malformed_fallback_reply_yields_empty() {
    for reply in ["not json", "[\"UK\"]", r#"{"markets": "UK"}"#] {
        let interpreter = interpreter_with(StubCompletion::replying(reply));
        assert!(interpreter.parse("something vague").await.is_empty(), "{reply}");
    }
}

#[tokio::test]
async fn test_fallback_reply_outside_vocabulary_yields_empty() {
    let reply = r#"{"markets": ["XX"], "channels": ["Snapchat"], "partners": ["Nobody"]}"#;
    let interpreter = interpreter_with(StubCompletion::replying(reply));

    assert!(interpreter.parse("something vague").await.is_empty());
}

#[tokio::test]
async fn test_without_fallback_nothing_recognized_is_empty() {
    let interpreter = pattern_interpreter();

    assert_eq!(interpreter.strategy_names(), vec!["pattern"]);
    assert!(interpreter.parse("").await.is_empty());
    assert!(interpreter.parse("hello world").await.is_empty());
}

#[tokio::test]
async fn test_strategy_order() {
    let interpreter = interpreter_with(StubCompletion::failing());
    assert_eq!(interpreter.strategy_names(), vec!["pattern", "fallback"]);
}

async fn file_interpreter(path: &Path) -> QueryInterpreter {
    let store = VocabularyStore::load(Box::new(FileProvider::new(path)))
        .await
        .unwrap();
    QueryInterpreter::new(Arc::new(StaticTables::new()), Arc::new(store))
}

#[tokio::test]
async fn test_refreshed_vocabulary_applies_to_next_parse() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("vocabulary.json");
    std::fs::write(&path, r#"{"market_codes": ["UK"]}"#).unwrap();
    let interpreter = file_interpreter(&path).await;
    assert!(interpreter.parse("EE").await.is_empty());

    let held = interpreter.vocabulary().snapshot();
    std::fs::write(&path, r#"{"market_codes": ["UK", "EE"]}"#).unwrap();
    interpreter.vocabulary().refresh().await.unwrap();

    let parsed = interpreter.parse("EE").await;
    assert!(parsed.markets().unwrap().contains("EE"));
    // a snapshot taken earlier is unaffected
    assert!(!held.has_market("EE"));
}

/// Completion client that signals when it is called, then waits until the
/// gate closes before replying.
struct GatedCompletion {
    reply: String,
    entered: Notify,
    gate: Semaphore,
}

#[async_trait]
impl CompletionClient for GatedCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        self.entered.notify_one();
        // a closed semaphore fails every acquire, which is the release signal
        let _ = self.gate.acquire().await;
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "gated"
    }
}

#[tokio::test]
async fn test_in_flight_parse_keeps_its_snapshot_across_refresh() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("vocabulary.json");
    std::fs::write(&path, r#"{"market_codes": ["UK"]}"#).unwrap();

    let client = Arc::new(GatedCompletion {
        reply: r#"{"markets": ["UK", "FR"]}"#.to_string(),
        entered: Notify::new(),
        gate: Semaphore::new(0),
    });
    let interpreter = Arc::new(file_interpreter(&path).await.with_fallback(client.clone()));

    let in_flight = tokio::spawn({
        let interpreter = interpreter.clone();
        async move { interpreter.parse("britain and france").await }
    });
    client.entered.notified().await;

    std::fs::write(&path, r#"{"market_codes": ["UK", "FR"]}"#).unwrap();
    let refreshed = interpreter.vocabulary().refresh().await.unwrap();
    assert!(refreshed.has_market("FR"));

    client.gate.close();
    let parsed = in_flight.await.unwrap();
    assert_eq!(
        parsed.markets().unwrap().iter().collect::<Vec<_>>(),
        vec!["UK"]
    );

    // the next parse sees the refreshed vocabulary
    let parsed = interpreter.parse("britain and france").await;
    assert_eq!(
        parsed.markets().unwrap().iter().collect::<Vec<_>>(),
        vec!["FR", "UK"]
    );
}

#[tokio::test]
async fn test_load_failure_is_vocabulary_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = FileProvider::new(tmp.path().join("missing.json"));

    let result = VocabularyStore::load(Box::new(provider)).await;

    assert!(matches!(result, Err(EngineError::VocabularyUnavailable(_))));
}

#[tokio::test]
async fn test_refresh_failure_keeps_previous_vocabulary() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("vocabulary.json");
    let doc = VocabularyDocument {
        market_codes: ["UK".to_string()].into(),
        ..Default::default()
    };
    std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

    let interpreter = file_interpreter(&path).await;
    assert!(interpreter.parse("UK").await.markets().is_some());

    std::fs::remove_file(&path).unwrap();
    let result = interpreter.vocabulary().refresh().await;

    assert!(matches!(result, Err(EngineError::VocabularyUnavailable(_))));
    assert!(interpreter.parse("UK").await.markets().is_some());
}

#[tokio::test]
async fn test_refresh_installs_new_vocabulary() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("vocabulary.json");
    std::fs::write(&path, r#"{"market_codes": ["UK"]}"#).unwrap();

    let store = VocabularyStore::load(Box::new(FileProvider::new(&path)))
        .await
        .unwrap();
    assert!(!store.snapshot().has_market("FR"));

    std::fs::write(&path, r#"{"market_codes": ["UK", "FR"]}"#).unwrap();
    let refreshed = store.refresh().await.unwrap();

    assert!(refreshed.has_market("FR"));
    assert!(store.snapshot().has_market("FR"));
}

#[tokio::test]
async fn test_language_keys_are_markets_after_fallback() {
    let reply = r#"{"markets": ["UK"], "market_languages": {"UK": "en", "FR": "French"}}"#;
    let interpreter = interpreter_with(StubCompletion::replying(reply));

    let parsed = interpreter.parse("britain in english").await;

    let languages = parsed.market_languages().unwrap();
    assert_eq!(languages.get("UK").map(String::as_str), Some("English"));
    assert!(!languages.contains_key("FR"));
}

#[test]
fn test_sample_vocabulary_lookups() {
    let vocab = sample_vocabulary();
    assert_eq!(vocab.partner_name_by_id("p-sutra"), Some("Sutra"));
    assert_eq!(vocab.partner_name_by_id("nope"), None);
    assert_eq!(vocab.canonical_channel("FACEBOOK"), Some("Facebook"));
    assert_eq!(vocab.canonical_market(" uk "), Some("UK"));
}

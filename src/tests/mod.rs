mod interpreter;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::completion::{CompletionClient, CompletionError, CompletionRequest};
use crate::query::{QueryInterpreter, StaticTables};
use crate::vocabulary::{ReferenceVocabulary, VocabularyDocument, VocabularyStore};

fn strings(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Vocabulary used across the query tests.
pub fn sample_vocabulary() -> ReferenceVocabulary {
    VocabularyDocument {
        market_codes: strings(&[
            "UK", "US", "ES", "FR", "DE", "CH", "MX", "JP", "FI", "DK", "IS", "NO", "SE", "PL",
            "CZ", "CY", "JO", "SA", "MT", "LK", "MY", "ZA", "RU", "SG", "CA", "AE", "BH", "KW",
            "OM", "QA", "BR",
        ]),
        channels: strings(&[
            "Facebook", "Google", "NativeAds", "MSN", "Bing", "Instagram", "TikTok", "SEO",
            "Taboola", "Push", "Email",
        ]),
        partner_names: strings(&["Sutra", "TokoMedia", "MediaBuy", "AdCombo"]),
        partner_id_to_name: [("p-sutra", "Sutra"), ("p-adcombo", "AdCombo")]
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect(),
        funnels: strings(&["Crypto", "Nutra"]),
    }
    .into()
}

/// Completion client that replays a canned reply and counts calls.
pub struct StubCompletion {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl StubCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!request.instructions.is_empty());
        self.reply.clone().ok_or(CompletionError::NoChoices)
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

pub fn pattern_interpreter() -> QueryInterpreter {
    QueryInterpreter::new(
        Arc::new(StaticTables::new()),
        Arc::new(VocabularyStore::fixed(sample_vocabulary())),
    )
}

pub fn interpreter_with(client: Arc<StubCompletion>) -> QueryInterpreter {
    pattern_interpreter().with_fallback(client)
}

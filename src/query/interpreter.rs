use std::sync::Arc;

use async_trait::async_trait;

use super::extract::extract;
use super::fallback::FallbackParser;
use super::lexer::tokenize;
use super::tables::StaticTables;
use super::ParsedQuery;
use crate::completion::CompletionClient;
use crate::vocabulary::{ReferenceVocabulary, VocabularyStore};

/// Everything a strategy may look at for one parse.
pub struct QueryInput<'a> {
    pub text: &'a str,
    pub tokens: &'a [String],
    pub tables: &'a StaticTables,
    pub vocab: &'a ReferenceVocabulary,
}

/// One way of turning a query into criteria.
#[async_trait]
pub trait ParseStrategy: Send + Sync {
    /// `Some` only with a non-empty result.
    async fn attempt(&self, input: &QueryInput<'_>) -> Option<ParsedQuery>;

    /// Get the name of this strategy for logging
    fn name(&self) -> &'static str;
}

/// Deterministic token-pattern scan.
pub struct PatternStrategy;

#[async_trait]
impl ParseStrategy for PatternStrategy {
    async fn attempt(&self, input: &QueryInput<'_>) -> Option<ParsedQuery> {
        let parsed = extract(input.tokens, input.tables, input.vocab);
        (!parsed.is_empty()).then_some(parsed)
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}

/// Completion-service parser.
pub struct FallbackStrategy(FallbackParser);

impl FallbackStrategy {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self(FallbackParser::new(client))
    }
}

#[async_trait]
impl ParseStrategy for FallbackStrategy {
    async fn attempt(&self, input: &QueryInput<'_>) -> Option<ParsedQuery> {
        log::info!("no pattern match, asking the completion service");
        let parsed = self.0.parse(input.text, input.tables, input.vocab).await;
        (!parsed.is_empty()).then_some(parsed)
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// Runs its strategies in order and returns the first non-empty result.
///
/// Results are never merged across strategies: once one recognizes
/// anything, later ones do not run even for the fields it left empty.
pub struct QueryInterpreter {
    tables: Arc<StaticTables>,
    vocabulary: Arc<VocabularyStore>,
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl QueryInterpreter {
    /// Interpreter with the pattern strategy only.
    pub fn new(tables: Arc<StaticTables>, vocabulary: Arc<VocabularyStore>) -> Self {
        Self {
            tables,
            vocabulary,
            strategies: vec![Box::new(PatternStrategy)],
        }
    }

    /// Append a strategy after the existing ones.
    pub fn with_strategy(mut self, strategy: Box<dyn ParseStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_fallback(self, client: Arc<dyn CompletionClient>) -> Self {
        self.with_strategy(Box::new(FallbackStrategy::new(client)))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn vocabulary(&self) -> &Arc<VocabularyStore> {
        &self.vocabulary
    }

    /// Interpret a query against the vocabulary snapshot current at the
    /// start of the call. An empty result means nothing was recognized.
    pub async fn parse(&self, query: &str) -> ParsedQuery {
        let vocab = self.vocabulary.snapshot();
        let tokens = tokenize(query);
        log::debug!("query={query:?} tokens={tokens:?}");

        let input = QueryInput {
            text: query,
            tokens: &tokens,
            tables: &self.tables,
            vocab: &vocab,
        };

        for strategy in &self.strategies {
            if let Some(parsed) = strategy.attempt(&input).await {
                log::info!(
                    "strategy={} outcome=match fields=[{}]",
                    strategy.name(),
                    parsed.describe_fields()
                );
                return parsed;
            }
            log::debug!("strategy={} outcome=skip", strategy.name());
        }

        ParsedQuery::default()
    }
}

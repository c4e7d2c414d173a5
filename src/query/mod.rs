//! Query interpretation: free-form offer phrases to structured search criteria.
//!
//! - `lexer`: splits raw text into tokens
//! - `tables`: region, channel alias and language lookup tables
//! - `extract`: deterministic token-pattern scan
//! - `fallback`: completion-service parser with vocabulary validation
//! - `interpreter`: runs the strategies in order, first non-empty result wins

mod extract;
mod fallback;
mod interpreter;
mod lexer;
mod tables;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub use interpreter::QueryInterpreter;
pub use tables::StaticTables;

/// Structured search criteria.
///
/// A field is either absent or holds a non-empty collection. Every key of
/// `market_languages` is also in `markets`. Built only through [`QueryBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    markets: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    market_languages: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    partners: Option<Vec<String>>,
}

impl ParsedQuery {
    pub fn markets(&self) -> Option<&BTreeSet<String>> {
        self.markets.as_ref()
    }

    pub fn market_languages(&self) -> Option<&BTreeMap<String, String>> {
        self.market_languages.as_ref()
    }

    pub fn channels(&self) -> Option<&BTreeSet<String>> {
        self.channels.as_ref()
    }

    /// Partners in first-seen order.
    pub fn partners(&self) -> Option<&[String]> {
        self.partners.as_deref()
    }

    /// No criterion recognized.
    pub fn is_empty(&self) -> bool {
        self.markets.is_none()
            && self.market_languages.is_none()
            && self.channels.is_none()
            && self.partners.is_none()
    }

    /// Comma-separated list of the fields present, for logging.
    pub fn describe_fields(&self) -> String {
        let mut fields = Vec::new();
        if self.markets.is_some() {
            fields.push("markets");
        }
        if self.market_languages.is_some() {
            fields.push("market_languages");
        }
        if self.channels.is_some() {
            fields.push("channels");
        }
        if self.partners.is_some() {
            fields.push("partners");
        }
        fields.join(",")
    }
}

/// Accumulator shared by both parsers.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    markets: BTreeSet<String>,
    market_languages: BTreeMap<String, String>,
    channels: BTreeSet<String>,
    partners: Vec<String>,
}

impl QueryBuilder {
    pub fn add_market(&mut self, code: &str) {
        self.markets.insert(code.to_string());
    }

    /// Later assignments for the same market overwrite earlier ones.
    pub fn set_language(&mut self, market: &str, language: &str) {
        self.market_languages
            .insert(market.to_string(), language.to_string());
    }

    pub fn has_language(&self, market: &str) -> bool {
        self.market_languages.contains_key(market)
    }

    pub fn add_channel(&mut self, channel: &str) {
        self.channels.insert(channel.to_string());
    }

    pub fn add_partner(&mut self, partner: &str) {
        if !self.partners.iter().any(|p| p == partner) {
            self.partners.push(partner.to_string());
        }
    }

    pub fn build(self) -> ParsedQuery {
        let QueryBuilder {
            markets,
            mut market_languages,
            channels,
            partners,
        } = self;

        market_languages.retain(|market, _| markets.contains(market));

        ParsedQuery {
            markets: (!markets.is_empty()).then_some(markets),
            market_languages: (!market_languages.is_empty()).then_some(market_languages),
            channels: (!channels.is_empty()).then_some(channels),
            partners: (!partners.is_empty()).then_some(partners),
        }
    }
}

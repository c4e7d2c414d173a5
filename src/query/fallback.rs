use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::extract::split_compact;
use super::tables::{StaticTables, DEFAULT_LANGUAGE};
use super::{ParsedQuery, QueryBuilder};
use crate::completion::{CompletionClient, CompletionRequest};
use crate::errors::EngineError;
use crate::vocabulary::ReferenceVocabulary;

/// Shape the completion service is asked to reply with.
#[derive(Debug, Default, Deserialize)]
struct FallbackReply {
    #[serde(default)]
    markets: Option<Vec<String>>,
    #[serde(default)]
    market_languages: Option<BTreeMap<String, String>>,
    #[serde(default)]
    channels: Option<Vec<String>>,
    #[serde(default)]
    partners: Option<Vec<String>>,
}

/// Instruction block listing the closed vocabulary and the encoding rules.
pub fn instructions(tables: &StaticTables, vocab: &ReferenceVocabulary) -> String {
    format!(
        "You are a deal search assistant. Extract search criteria from the user's query.\n\
         Return a single flat JSON object with only these optional fields:\n\
         - markets: list of market codes\n\
         - market_languages: object mapping a market code to a language name\n\
         - channels: list of traffic channels\n\
         - partners: list of partner names\n\
         Omit a field entirely when the query does not mention it; never return empty lists.\n\
         \n\
         Only these values are acceptable, use them exactly as written:\n\
         Market codes: {markets}\n\
         Channels: {channels}\n\
         Partners: {partners}\n\
         \n\
         Rules:\n\
         - Market codes are uppercase.\n\
         - A language written right after a market belongs to that market.\n\
         - The default language is \"{default}\".\n\
         - A market code fused with a 2-3 letter language suffix means that\n\
           market in that language, e.g. \"CHfr\" is market CH in French.\n\
         - A region label ({regions}) stands for all of its markets.\n\
         - Only add market_languages entries for markets that are in markets.",
        markets = join_values(vocab.market_codes()),
        channels = join_values(vocab.channels()),
        partners = join_values(vocab.partner_names()),
        regions = tables.region_labels().collect::<Vec<_>>().join(", "),
        default = DEFAULT_LANGUAGE,
    )
}

fn join_values<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a completion reply and keep only values the vocabulary knows.
///
/// Anything that is not a JSON object, or has a field of the wrong type, is
/// malformed. Unknown keys are ignored.
pub fn validate_reply(
    content: &str,
    tables: &StaticTables,
    vocab: &ReferenceVocabulary,
) -> Result<ParsedQuery, EngineError> {
    let value: Value = serde_json::from_str(content.trim())
        .map_err(|err| EngineError::MalformedFallbackResponse(err.to_string()))?;
    if !value.is_object() {
        return Err(EngineError::MalformedFallbackResponse(
            "reply is not a JSON object".to_string(),
        ));
    }
    let reply: FallbackReply = serde_json::from_value(value)
        .map_err(|err| EngineError::MalformedFallbackResponse(err.to_string()))?;

    let mut acc = QueryBuilder::default();
    let mut compact_languages = Vec::new();

    for market in reply.markets.iter().flatten() {
        let market = market.trim();
        if let Some(code) = vocab.canonical_market(market) {
            acc.add_market(code);
            continue;
        }
        if let Some((code, suffix)) = split_compact(market, vocab) {
            acc.add_market(code);
            compact_languages.push((code, tables.normalize_language(suffix)));
            continue;
        }
        let region = tables.expand_region(market);
        if region.is_empty() {
            log::debug!("fallback discarded market {market:?}");
        }
        for code in region.iter().filter(|code| vocab.has_market(code)) {
            acc.add_market(code);
        }
    }

    for (market, language) in reply.market_languages.iter().flatten() {
        match vocab.canonical_market(market) {
            Some(code) => acc.set_language(code, tables.normalize_language(language)),
            None => log::debug!("fallback discarded language for {market:?}"),
        }
    }
    // explicit market_languages entries win over a compact suffix
    for (code, language) in compact_languages {
        if !acc.has_language(code) {
            acc.set_language(code, language);
        }
    }

    for channel in reply.channels.iter().flatten() {
        match tables.normalize_channel(channel, vocab) {
            Some(channel) => acc.add_channel(channel),
            None => log::debug!("fallback discarded channel {channel:?}"),
        }
    }

    for partner in reply.partners.iter().flatten() {
        match vocab.canonical_partner(partner) {
            Some(partner) => acc.add_partner(partner),
            None => log::debug!("fallback discarded partner {partner:?}"),
        }
    }

    Ok(acc.build())
}

/// Language-model parser used when the pattern scan finds nothing.
pub struct FallbackParser {
    client: Arc<dyn CompletionClient>,
}

impl FallbackParser {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Never fails: service errors and malformed replies yield an empty
    /// result after being logged.
    pub async fn parse(
        &self,
        query: &str,
        tables: &StaticTables,
        vocab: &ReferenceVocabulary,
    ) -> ParsedQuery {
        match self.try_parse(query, tables, vocab).await {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("model={} outcome=error err={err}", self.client.model_name());
                ParsedQuery::default()
            }
        }
    }

    async fn try_parse(
        &self,
        query: &str,
        tables: &StaticTables,
        vocab: &ReferenceVocabulary,
    ) -> Result<ParsedQuery, EngineError> {
        let request = CompletionRequest {
            instructions: instructions(tables, vocab),
            query: query.to_string(),
        };
        let content = self.client.complete(&request).await?;
        validate_reply(&content, tables, vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_vocabulary;

    fn validate(content: &str) -> Result<ParsedQuery, EngineError> {
        validate_reply(content, &StaticTables::new(), &sample_vocabulary())
    }

    #[test]
    fn test_instructions_list_vocabulary() {
        let text = instructions(&StaticTables::new(), &sample_vocabulary());
        assert!(text.contains("AE, BH, BR, CA"));
        assert!(text.contains("AdCombo, MediaBuy, Sutra, TokoMedia"));
        assert!(text.contains("NativeAds"));
        assert!(text.contains("\"Native\""));
        assert!(text.contains("market_languages"));
        assert!(text.contains("NORDICS, GCC"));
    }

    #[test]
    fn test_valid_reply_is_canonicalized() {
        let parsed = validate(
            r#"{
                "markets": ["uk", "ES"],
                "market_languages": {"es": "spanish"},
                "channels": ["facebook", "fb", "native ads"],
                "partners": ["SUTRA", "sutra", "AdCombo"]
            }"#,
        )
        .unwrap();

        assert_eq!(
            parsed.markets().unwrap().iter().collect::<Vec<_>>(),
            vec!["ES", "UK"]
        );
        assert_eq!(
            parsed.market_languages().unwrap().get("ES").map(String::as_str),
            Some("Spanish")
        );
        assert_eq!(
            parsed.channels().unwrap().iter().collect::<Vec<_>>(),
            vec!["Facebook", "NativeAds"]
        );
        assert_eq!(
            parsed.partners().unwrap(),
            &["Sutra".to_string(), "AdCombo".to_string()]
        );
    }

    #[test]
    fn test_unknown_values_are_discarded() {
        let parsed = validate(
            r#"{"markets": ["UK", "Atlantis"], "channels": ["Snapchat"], "partners": ["Nobody"]}"#,
        )
        .unwrap();

        assert_eq!(parsed.markets().unwrap().len(), 1);
        assert!(parsed.channels().is_none());
        assert!(parsed.partners().is_none());
    }

    #[test]
    fn test_compact_and_region_markets() {
        let parsed = validate(r#"{"markets": ["CHfr", "NORDICS"]}"#).unwrap();

        let markets = parsed.markets().unwrap();
        assert!(markets.contains("CH"));
        assert!(markets.contains("SE"));
        assert_eq!(markets.len(), 6);

        let languages = parsed.market_languages().unwrap();
        assert_eq!(languages.len(), 1);
        assert_eq!(languages.get("CH").map(String::as_str), Some("French"));
    }

    #[test]
    fn test_explicit_language_wins_over_compact_suffix() {
        let parsed =
            validate(r#"{"markets": ["CHfr"], "market_languages": {"CH": "German"}}"#).unwrap();

        assert_eq!(
            parsed.market_languages().unwrap().get("CH").map(String::as_str),
            Some("German")
        );
    }

    #[test]
    fn test_unknown_language_becomes_native() {
        let parsed =
            validate(r#"{"markets": ["FR"], "market_languages": {"FR": "Elvish"}}"#).unwrap();

        assert_eq!(
            parsed.market_languages().unwrap().get("FR").map(String::as_str),
            Some("Native")
        );
    }

    #[test]
    fn test_language_for_unlisted_market_is_dropped() {
        let parsed = validate(r#"{"market_languages": {"DE": "German"}}"#).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_unknown_keys_and_nulls_are_ignored() {
        let parsed = validate(r#"{"markets": ["DE"], "budget": 100, "channels": null}"#).unwrap();

        assert!(parsed.markets().is_some());
        assert!(parsed.channels().is_none());
    }

    #[test]
    fn test_empty_object_is_empty_result() {
        assert!(validate("{}").unwrap().is_empty());
        assert!(validate(r#"{"markets": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_replies() {
        for content in [
            "",
            "UK, ES",
            "[\"UK\"]",
            "\"UK\"",
            r#"{"markets": "UK"}"#,
            r#"{"markets": [1, 2]}"#,
            r#"{"market_languages": ["UK"]}"#,
        ] {
            assert!(
                matches!(
                    validate(content),
                    Err(EngineError::MalformedFallbackResponse(_))
                ),
                "{content:?}"
            );
        }
    }
}

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use super::tables::{fold_alias_text, StaticTables};
use super::{ParsedQuery, QueryBuilder};
use crate::vocabulary::ReferenceVocabulary;

// <2-letter market><2-3 letter language suffix>, e.g. "CHfr", "UKru"
static COMPACT_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2})([A-Za-z]{2,3})$").expect("compact token pattern is valid")
});

/// Deterministic scan of a token sequence.
///
/// Pass one walks the tokens left to right with one token of lookahead and
/// classifies regions, compact tokens and market codes. Pass two finds
/// channel aliases anywhere in the query, then matches the remaining tokens
/// against vocabulary channels and partners. Market tokens take no part in it.
pub fn extract(
    tokens: &[String],
    tables: &StaticTables,
    vocab: &ReferenceVocabulary,
) -> ParsedQuery {
    let mut acc = QueryBuilder::default();
    let market_tokens = scan_markets(tokens, tables, vocab, &mut acc);
    scan_channels_and_partners(tokens, tables, vocab, &market_tokens, &mut acc);
    acc.build()
}

/// Returns, per token, whether it was classified as a market.
fn scan_markets(
    tokens: &[String],
    tables: &StaticTables,
    vocab: &ReferenceVocabulary,
    acc: &mut QueryBuilder,
) -> Vec<bool> {
    let mut market_tokens = vec![false; tokens.len()];
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        let region = tables.expand_region(token);
        if !region.is_empty() {
            market_tokens[i] = true;
            let added: Vec<&str> = region
                .iter()
                .map(String::as_str)
                .filter(|code| vocab.has_market(code))
                .collect();
            for code in &added {
                acc.add_market(code);
            }
            i += attach_language(tokens, i, tables, &added, acc);
            continue;
        }

        if let Some((market, suffix)) = split_compact(token, vocab) {
            market_tokens[i] = true;
            acc.add_market(market);
            acc.set_language(market, tables.normalize_language(suffix));
            i += 1;
            continue;
        }

        if let Some(market) = vocab.canonical_market(token) {
            market_tokens[i] = true;
            acc.add_market(market);
            i += attach_language(tokens, i, tables, &[market], acc);
            continue;
        }

        i += 1;
    }

    market_tokens
}

/// Language lookahead after the market(s) at `tokens[i]`.
///
/// Returns how many tokens were consumed: 2 when `tokens[i + 1]` was taken
/// as their language, otherwise 1.
fn attach_language(
    tokens: &[String],
    i: usize,
    tables: &StaticTables,
    markets: &[&str],
    acc: &mut QueryBuilder,
) -> usize {
    match tokens.get(i + 1) {
        Some(next) if tables.is_language_word(next) && !starts_ads_phrase(tokens, i + 1) => {
            let language = tables.normalize_language(next);
            for market in markets {
                acc.set_language(market, language);
            }
            2
        }
        _ => 1,
    }
}

/// "Native Ads" guard: the token at `at` is followed by "ads"/"ad".
fn starts_ads_phrase(tokens: &[String], at: usize) -> bool {
    tokens
        .get(at + 1)
        .map(|t| t.eq_ignore_ascii_case("ads") || t.eq_ignore_ascii_case("ad"))
        .unwrap_or(false)
}

/// Split a compact token into its market code and language suffix.
pub(super) fn split_compact<'v, 't>(
    token: &'t str,
    vocab: &'v ReferenceVocabulary,
) -> Option<(&'v str, &'t str)> {
    let caps = COMPACT_TOKEN.captures(token)?;
    let market = vocab.canonical_market(caps.get(1)?.as_str())?;
    Some((market, caps.get(2)?.as_str()))
}

fn scan_channels_and_partners(
    tokens: &[String],
    tables: &StaticTables,
    vocab: &ReferenceVocabulary,
    market_tokens: &[bool],
    acc: &mut QueryBuilder,
) {
    // Alias containment over the whole folded query, so phrases spanning
    // tokens ("native ads") and fused ones ("Google-Ads") are both found.
    let (folded, spans) = fold_tokens(tokens);
    let mut phrase_tokens = vec![false; tokens.len()];
    let mut taken: Vec<Range<usize>> = Vec::new();

    for (range, canonical) in tables.channel_alias_matches(&folded) {
        if taken.iter().any(|t| overlaps(t, &range)) {
            continue;
        }
        let covered: Vec<usize> = spans
            .iter()
            .enumerate()
            .filter(|(_, span)| overlaps(span, &range))
            .map(|(i, _)| i)
            .collect();
        if covered.iter().any(|&i| market_tokens[i]) {
            continue;
        }
        let Some(channel) = vocab.canonical_channel(canonical) else {
            continue;
        };
        acc.add_channel(channel);
        for i in covered {
            phrase_tokens[i] = true;
        }
        taken.push(range);
    }

    for (i, token) in tokens.iter().enumerate() {
        if market_tokens[i] || phrase_tokens[i] || tables.is_language_word(token) {
            continue;
        }

        let channel = vocab.canonical_channel(token);
        let partner = vocab.canonical_partner(token);
        if let Some(channel) = channel {
            acc.add_channel(channel);
        }
        if let Some(partner) = partner {
            acc.add_partner(partner);
        }
        if channel.is_none() && partner.is_none() {
            log::debug!("unrecognized token {token:?}");
        }
    }
}

/// Fold every token and join them with single spaces. Returns the folded
/// query and, per token, the byte range it occupies in it.
fn fold_tokens(tokens: &[String]) -> (String, Vec<Range<usize>>) {
    let mut folded = String::new();
    let mut spans = Vec::with_capacity(tokens.len());
    for token in tokens {
        let piece = fold_alias_text(token);
        if !piece.is_empty() && !folded.is_empty() {
            folded.push(' ');
        }
        let start = folded.len();
        folded.push_str(&piece);
        spans.push(start..folded.len());
    }
    (folded, spans)
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    !a.is_empty() && !b.is_empty() && a.start < b.end && b.start < a.end
}

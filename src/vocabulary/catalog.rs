use serde_json::Value;

use super::{ReferenceVocabulary, VocabularyDocument};

const MARKET_PROPERTY: &str = "GEO-Funnel Code";
const PARTNER_RELATION_PROPERTY: &str = "⚡ ALL ADVERTISERS | Kitchen";
const PARTNER_NAME_PROPERTY: &str = "Partner";
const SOURCES_PROPERTY: &str = "Sources";
const FUNNELS_PROPERTY: &str = "Funnels";

/// Fold catalog rows into a vocabulary.
///
/// Rows missing a property simply contribute nothing for it.
pub fn fold_catalog_pages(pages: &[Value]) -> ReferenceVocabulary {
    let mut doc = VocabularyDocument::default();

    for page in pages {
        let Some(properties) = page.get("properties") else {
            continue;
        };

        if let Some(market) = properties
            .get(MARKET_PROPERTY)
            .and_then(first_title_text)
            .and_then(market_from_funnel_code)
        {
            doc.market_codes.insert(market);
        }

        let partner_id = properties
            .get(PARTNER_RELATION_PROPERTY)
            .and_then(|v| v.get("relation"))
            .and_then(|v| v.as_array())
            .and_then(|relations| relations.first())
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str());
        if let Some(partner_id) = partner_id {
            let partner_name = properties
                .get(PARTNER_NAME_PROPERTY)
                .and_then(|v| v.get("formula"))
                .and_then(|v| v.get("string"))
                .and_then(|v| v.as_str())
                .filter(|name| !name.is_empty());
            if let Some(partner_name) = partner_name {
                doc.partner_names.insert(partner_name.to_string());
                doc.partner_id_to_name
                    .insert(partner_id.to_string(), partner_name.to_string());
            }
        }

        if let Some(sources) = properties.get(SOURCES_PROPERTY) {
            doc.channels.extend(multi_select_names(sources));
        }
        if let Some(funnels) = properties.get(FUNNELS_PROPERTY) {
            doc.funnels.extend(multi_select_names(funnels));
        }
    }

    log::info!(
        "loaded reference data: {} market codes, {} partner names, {} channels, {} funnels",
        doc.market_codes.len(),
        doc.partner_names.len(),
        doc.channels.len(),
        doc.funnels.len()
    );

    doc.into()
}

fn first_title_text(property: &Value) -> Option<&str> {
    property
        .get("title")
        .and_then(|v| v.as_array())
        .and_then(|title| title.first())
        .and_then(|v| v.get("plain_text"))
        .and_then(|v| v.as_str())
}

/// "UK - Finance" → "UK", "DE Push - Crypto" → "DE". Codes without a
/// hyphen are not funnel codes and yield nothing.
fn market_from_funnel_code(code: &str) -> Option<String> {
    let (head, _) = code.split_once('-')?;
    let market = head.trim().split(' ').next().unwrap_or_default().trim();
    (!market.is_empty()).then(|| market.to_string())
}

fn multi_select_names(property: &Value) -> impl Iterator<Item = String> + '_ {
    property
        .get("multi_select")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|option| option.get("name").and_then(|v| v.as_str()))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

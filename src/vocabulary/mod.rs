//! Closed reference vocabulary the query parsers validate against.
//!
//! # Architecture
//!
//! - `catalog`: folds catalog rows (document-database pages) into a vocabulary
//! - `provider`: where a vocabulary comes from (file, remote catalog)
//! - `store`: the current snapshot, swapped wholesale on refresh

mod catalog;
mod provider;
mod store;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

pub use catalog::fold_catalog_pages;
#[cfg(test)]
pub use provider::StaticProvider;
pub use provider::{CatalogProvider, FileProvider, VocabularyProvider};
pub use store::VocabularyStore;

/// Plain serialized form of a vocabulary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularyDocument {
    #[serde(default)]
    pub market_codes: BTreeSet<String>,
    #[serde(default)]
    pub channels: BTreeSet<String>,
    #[serde(default)]
    pub partner_names: BTreeSet<String>,
    #[serde(default)]
    pub partner_id_to_name: BTreeMap<String, String>,
    #[serde(default)]
    pub funnels: BTreeSet<String>,
}

/// Read-only snapshot of valid market codes, channels and partners.
///
/// Strings keep the case the source of truth supplied. Lookups by user
/// text go through lowercase indexes built once at construction.
#[derive(Clone, Debug, Default)]
pub struct ReferenceVocabulary {
    doc: VocabularyDocument,
    channel_index: HashMap<String, String>,
    partner_index: HashMap<String, String>,
}

impl From<VocabularyDocument> for ReferenceVocabulary {
    fn from(doc: VocabularyDocument) -> Self {
        let index = |names: &BTreeSet<String>| {
            names
                .iter()
                .map(|name| (name.to_lowercase(), name.clone()))
                .collect::<HashMap<_, _>>()
        };
        let channel_index = index(&doc.channels);
        let partner_index = index(&doc.partner_names);

        Self {
            doc,
            channel_index,
            partner_index,
        }
    }
}

impl ReferenceVocabulary {
    pub fn market_codes(&self) -> &BTreeSet<String> {
        &self.doc.market_codes
    }

    pub fn channels(&self) -> &BTreeSet<String> {
        &self.doc.channels
    }

    pub fn partner_names(&self) -> &BTreeSet<String> {
        &self.doc.partner_names
    }

    pub fn partner_id_to_name(&self) -> &BTreeMap<String, String> {
        &self.doc.partner_id_to_name
    }

    pub fn funnels(&self) -> &BTreeSet<String> {
        &self.doc.funnels
    }

    pub fn is_empty(&self) -> bool {
        self.doc.market_codes.is_empty()
            && self.doc.channels.is_empty()
            && self.doc.partner_names.is_empty()
    }

    /// Exact membership of a market code.
    pub fn has_market(&self, code: &str) -> bool {
        self.doc.market_codes.contains(code)
    }

    /// Market code for user text, matched after uppercasing.
    pub fn canonical_market(&self, token: &str) -> Option<&str> {
        self.doc
            .market_codes
            .get(token.trim().to_uppercase().as_str())
            .map(String::as_str)
    }

    /// Canonical channel name for a case-insensitive exact match.
    pub fn canonical_channel(&self, token: &str) -> Option<&str> {
        self.channel_index
            .get(&token.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Canonical partner name for a case-insensitive exact match.
    pub fn canonical_partner(&self, token: &str) -> Option<&str> {
        self.partner_index
            .get(&token.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn partner_name_by_id(&self, partner_id: &str) -> Option<&str> {
        self.doc
            .partner_id_to_name
            .get(partner_id)
            .map(String::as_str)
    }
}

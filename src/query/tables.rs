use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use crate::vocabulary::ReferenceVocabulary;

/// Language assumed when a token names no known language.
pub const DEFAULT_LANGUAGE: &str = "Native";

const REGIONS: &[(&str, &[&str])] = &[
    ("NORDICS", &["DK", "FI", "IS", "NO", "SE"]),
    ("GCC", &["AE", "BH", "KW", "OM", "QA", "SA"]),
    ("BALTICS", &["EE", "LT", "LV"]),
    ("BENELUX", &["BE", "LU", "NL"]),
    ("DACH", &["AT", "CH", "DE"]),
    ("LATAM", &["AR", "BR", "CL", "CO", "MX", "PE"]),
    ("TIER1", &["AU", "CA", "DE", "UK", "US"]),
];

// variant (one or more words) -> canonical channel
const CHANNEL_ALIASES: &[(&str, &str)] = &[
    ("fb", "Facebook"),
    ("facebook", "Facebook"),
    ("gg", "Google"),
    ("google", "Google"),
    ("google ads", "Google"),
    ("ig", "Instagram"),
    ("insta", "Instagram"),
    ("instagram", "Instagram"),
    ("tt", "TikTok"),
    ("tiktok", "TikTok"),
    ("tik tok", "TikTok"),
    ("native ads", "NativeAds"),
    ("native ad", "NativeAds"),
    ("nativeads", "NativeAds"),
    ("msn", "MSN"),
    ("bing", "Bing"),
    ("yt", "YouTube"),
    ("youtube", "YouTube"),
    ("push", "Push"),
    ("push ads", "Push"),
    ("email", "Email"),
    ("e-mail", "Email"),
    ("seo", "SEO"),
    ("taboola", "Taboola"),
    ("outbrain", "Outbrain"),
];

// Full names. Only these make a token act as a language after a market.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("native", "Native"),
    ("english", "English"),
    ("french", "French"),
    ("german", "German"),
    ("spanish", "Spanish"),
    ("italian", "Italian"),
    ("portuguese", "Portuguese"),
    ("russian", "Russian"),
    ("arabic", "Arabic"),
    ("polish", "Polish"),
    ("czech", "Czech"),
    ("dutch", "Dutch"),
    ("japanese", "Japanese"),
    ("turkish", "Turkish"),
    ("greek", "Greek"),
    ("hindi", "Hindi"),
    ("chinese", "Chinese"),
    ("korean", "Korean"),
    ("swedish", "Swedish"),
    ("norwegian", "Norwegian"),
    ("danish", "Danish"),
    ("finnish", "Finnish"),
    ("romanian", "Romanian"),
    ("hungarian", "Hungarian"),
];

// Short suffixes used by compact tokens such as "CHfr".
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("en", "English"),
    ("eng", "English"),
    ("fr", "French"),
    ("fra", "French"),
    ("fre", "French"),
    ("de", "German"),
    ("ger", "German"),
    ("deu", "German"),
    ("es", "Spanish"),
    ("spa", "Spanish"),
    ("it", "Italian"),
    ("ita", "Italian"),
    ("pt", "Portuguese"),
    ("por", "Portuguese"),
    ("ru", "Russian"),
    ("rus", "Russian"),
    ("ar", "Arabic"),
    ("ara", "Arabic"),
    ("pl", "Polish"),
    ("pol", "Polish"),
    ("cs", "Czech"),
    ("cz", "Czech"),
    ("cze", "Czech"),
    ("nl", "Dutch"),
    ("nld", "Dutch"),
    ("dut", "Dutch"),
    ("ja", "Japanese"),
    ("jp", "Japanese"),
    ("jpn", "Japanese"),
    ("tr", "Turkish"),
    ("tur", "Turkish"),
    ("el", "Greek"),
    ("gr", "Greek"),
    ("hi", "Hindi"),
    ("hin", "Hindi"),
    ("zh", "Chinese"),
    ("chi", "Chinese"),
    ("ko", "Korean"),
    ("kor", "Korean"),
    ("sv", "Swedish"),
    ("swe", "Swedish"),
    ("no", "Norwegian"),
    ("nor", "Norwegian"),
    ("da", "Danish"),
    ("dan", "Danish"),
    ("fi", "Finnish"),
    ("fin", "Finnish"),
    ("ro", "Romanian"),
    ("ron", "Romanian"),
    ("hu", "Hungarian"),
    ("hun", "Hungarian"),
];

struct ChannelAlias {
    // folded form, see `fold_alias_text`
    phrase: String,
    canonical: &'static str,
}

/// Immutable lookup tables, built once and passed by reference.
pub struct StaticTables {
    regions: HashMap<String, &'static [&'static str]>,
    // longest phrases first so "native ads" wins over "native ad"
    channel_aliases: Vec<ChannelAlias>,
    language_names: HashMap<String, &'static str>,
    language_codes: HashMap<String, &'static str>,
}

impl Default for StaticTables {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticTables {
    pub fn new() -> Self {
        let regions = REGIONS
            .iter()
            .map(|(label, codes)| (label.to_lowercase(), *codes))
            .collect();

        let mut channel_aliases: Vec<ChannelAlias> = CHANNEL_ALIASES
            .iter()
            .map(|&(variant, canonical)| ChannelAlias {
                phrase: fold_alias_text(variant),
                canonical,
            })
            .collect();
        channel_aliases.sort_by(|a, b| b.phrase.len().cmp(&a.phrase.len()));

        let to_map = |table: &[(&str, &'static str)]| {
            table
                .iter()
                .map(|(alias, canonical)| (alias.to_string(), *canonical))
                .collect::<HashMap<_, _>>()
        };

        Self {
            regions,
            channel_aliases,
            language_names: to_map(LANGUAGE_NAMES),
            language_codes: to_map(LANGUAGE_CODES),
        }
    }

    /// Region labels in table order.
    pub fn region_labels(&self) -> impl Iterator<Item = &'static str> {
        REGIONS.iter().map(|(label, _)| *label)
    }

    fn region(&self, token: &str) -> Option<&'static [&'static str]> {
        self.regions.get(&token.to_lowercase()).copied()
    }

    /// Markets of a region label (case-insensitive, whole token), empty
    /// when the token is no region.
    pub fn expand_region(&self, token: &str) -> BTreeSet<String> {
        self.region(token)
            .map(|codes| codes.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default()
    }

    /// Channel aliases contained in folded text, longest alias first.
    ///
    /// An occurrence only counts when it sits on word boundaries, so "ig"
    /// never matches inside "nigeria". Occurrences of different aliases may
    /// overlap; callers decide which to keep.
    pub fn channel_alias_matches<'a>(
        &'a self,
        folded: &'a str,
    ) -> impl Iterator<Item = (Range<usize>, &'static str)> + 'a {
        self.channel_aliases.iter().flat_map(move |alias| {
            folded
                .match_indices(alias.phrase.as_str())
                .map(|(start, phrase)| start..start + phrase.len())
                .filter(move |range| on_word_boundary(folded, range))
                .map(move |range| (range, alias.canonical))
        })
    }

    /// Canonical channel when the whole text is an alias.
    pub fn channel_alias(&self, text: &str) -> Option<&'static str> {
        let folded = fold_alias_text(text);
        self.channel_aliases
            .iter()
            .find(|alias| alias.phrase == folded)
            .map(|alias| alias.canonical)
    }

    /// Single-value channel resolution: alias table first, then the
    /// vocabulary. Only channels the vocabulary knows are returned.
    pub fn normalize_channel<'v>(
        &self,
        token: &str,
        vocab: &'v ReferenceVocabulary,
    ) -> Option<&'v str> {
        self.channel_alias(token)
            .and_then(|canonical| vocab.canonical_channel(canonical))
            .or_else(|| vocab.canonical_channel(token))
    }

    /// Canonical language for a name or suffix. Total: unknown → "Native".
    pub fn normalize_language(&self, token: &str) -> &'static str {
        let key = token.to_lowercase();
        self.language_names
            .get(&key)
            .or_else(|| self.language_codes.get(&key))
            .copied()
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Whether a token is a full language name ("French", "Native").
    pub fn is_language_word(&self, token: &str) -> bool {
        self.language_names.contains_key(&token.to_lowercase())
    }
}

/// Lowercase `text` and collapse every run of non-alphanumeric characters
/// into one space: "Google-Ads" and "google  ads" both fold to "google ads".
pub fn fold_alias_text(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    let mut gap = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if gap && !folded.is_empty() {
                folded.push(' ');
            }
            gap = false;
            folded.extend(c.to_lowercase());
        } else {
            gap = true;
        }
    }
    folded
}

fn on_word_boundary(text: &str, range: &Range<usize>) -> bool {
    let before = text[..range.start].chars().next_back();
    let after = text[range.end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

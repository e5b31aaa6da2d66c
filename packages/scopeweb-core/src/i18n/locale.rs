//! Language tags and request locale signals.

use std::fmt;

/// A normalized BCP 47-style language tag (`en`, `pt-br`, `zh-hant-tw`).
///
/// Normalization lowercases the tag and maps `_` to `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageTag(String);

impl LanguageTag {
    /// Parses a single tag. Returns `None` for `*`, empty input, or subtags
    /// that are not 1-8 ASCII alphanumerics.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().replace('_', "-").to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }
        let valid = normalized.split('-').all(|subtag| {
            (1..=8).contains(&subtag.len()) && subtag.bytes().all(|b| b.is_ascii_alphanumeric())
        });
        valid.then_some(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The primary language subtag (`pt` for `pt-br`).
    #[must_use]
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// This tag followed by each shorter prefix: `zh-hant-tw`, `zh-hant`, `zh`.
    pub fn fallbacks(&self) -> impl Iterator<Item = &str> {
        let tag = self.0.as_str();
        let cuts = tag
            .char_indices()
            .filter(|&(_, c)| c == '-')
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        std::iter::once(tag).chain(cuts.into_iter().rev().map(move |i| &tag[..i]))
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses a preference list such as `de-DE,de;q=0.9,en;q=0.8`.
///
/// Entries are returned by descending weight, stable for equal weights.
/// Entries with `q=0`, wildcards and malformed tags are dropped.
#[must_use]
pub fn parse_preferences(header: &str) -> Vec<LanguageTag> {
    let mut weighted: Vec<(LanguageTag, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = LanguageTag::parse(parts.next()?)?;
            let mut weight = 1.0_f32;
            for param in parts {
                if let Some(q) = param.trim().strip_prefix("q=") {
                    weight = q.trim().parse().ok()?;
                }
            }
            (weight > 0.0).then_some((tag, weight))
        })
        .collect();
    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
    weighted.into_iter().map(|(tag, _)| tag).collect()
}

/// Locale hints carried by a request, highest precedence first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleSignals {
    /// Value of the `lang` cookie.
    pub cookie: Option<String>,
    /// Value of the `Accept-Language` header.
    pub accept_language: Option<String>,
}

impl LocaleSignals {
    /// Candidate tags in precedence order: cookie first, then header.
    #[must_use]
    pub fn candidates(&self) -> Vec<LanguageTag> {
        [self.cookie.as_deref(), self.accept_language.as_deref()]
            .into_iter()
            .flatten()
            .flat_map(parse_preferences)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case_and_separator() {
        assert_eq!(LanguageTag::parse("pt_BR").unwrap().as_str(), "pt-br");
        assert_eq!(LanguageTag::parse(" EN ").unwrap().as_str(), "en");
    }

    #[test]
    fn parse_rejects_malformed_tags() {
        assert!(LanguageTag::parse("").is_none());
        assert!(LanguageTag::parse("*").is_none());
        assert!(LanguageTag::parse("en--us").is_none());
        assert!(LanguageTag::parse("waytoolongsubtag").is_none());
    }

    #[test]
    fn fallbacks_walk_prefixes() {
        let tag = LanguageTag::parse("zh-Hant-TW").unwrap();
        let chain: Vec<_> = tag.fallbacks().collect();
        assert_eq!(chain, vec!["zh-hant-tw", "zh-hant", "zh"]);
        assert_eq!(tag.language(), "zh");
    }

    #[test]
    fn preferences_sorted_by_weight() {
        let tags = parse_preferences("en;q=0.5, de-DE, fr;q=0.8, *;q=0.1, it;q=0");
        let names: Vec<_> = tags.iter().map(LanguageTag::as_str).collect();
        assert_eq!(names, vec!["de-de", "fr", "en"]);
    }

    #[test]
    fn preferences_drop_bad_weights() {
        let tags = parse_preferences("en;q=abc,de");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].as_str(), "de");
    }

    #[test]
    fn candidates_put_cookie_before_header() {
        let signals = LocaleSignals {
            cookie: Some("fr".to_string()),
            accept_language: Some("de, en;q=0.5".to_string()),
        };
        let names: Vec<_> = signals.candidates().into_iter().map(|t| t.0).collect();
        assert_eq!(names, vec!["fr", "de", "en"]);
    }
}

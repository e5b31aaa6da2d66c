//! Message catalogs and the catalog loader seam.
//!
//! A catalog asset is `<resources_path>/<locale>.all.json` in one of two
//! shapes:
//!
//! ```json
//! [{"id": "greeting", "translation": "Hello {{.Name}}"},
//!  {"id": "items", "translation": {"one": "{{.Count}} item", "other": "{{.Count}} items"}}]
//! ```
//!
//! or the equivalent map `{"greeting": "Hello {{.Name}}", "items": {...}}`.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::locale::LanguageTag;

/// Failure to load one locale's catalog. Logged at startup; the locale is
/// skipped.
#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("not a parseable language: {0:?}")]
    UnparseableLocale(String),
    #[error("could not load asset {key:?}: {source}")]
    Asset {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("i18n asset {key:?} is empty")]
    Empty { key: String },
    #[error("could not parse catalog for {locale:?}: {source}")]
    Parse {
        locale: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Plural categories
// ---------------------------------------------------------------------------

/// CLDR plural category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "zero" => Some(Self::Zero),
            "one" => Some(Self::One),
            "two" => Some(Self::Two),
            "few" => Some(Self::Few),
            "many" => Some(Self::Many),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Category for `count` in `language` (a primary subtag).
    #[must_use]
    pub fn for_count(language: &str, count: f64) -> Self {
        let integer = count.fract() == 0.0;
        match language {
            "ja" | "zh" | "ko" | "th" | "vi" | "id" | "ms" => Self::Other,
            "fr" | "pt" => {
                if (0.0..2.0).contains(&count) {
                    Self::One
                } else {
                    Self::Other
                }
            }
            _ => {
                if integer && (count - 1.0).abs() < f64::EPSILON {
                    Self::One
                } else {
                    Self::Other
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Message / Catalog
// ---------------------------------------------------------------------------

/// A message template, optionally with plural forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Single(String),
    Plural(BTreeMap<PluralCategory, String>),
}

impl Message {
    /// The template for `category`, falling back to `other` and then to any
    /// form present.
    #[must_use]
    pub fn form(&self, category: Option<PluralCategory>) -> &str {
        match self {
            Self::Single(template) => template,
            Self::Plural(forms) => category
                .and_then(|c| forms.get(&c))
                .or_else(|| forms.get(&PluralCategory::Other))
                .or_else(|| forms.values().next())
                .map_or("", String::as_str),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTranslation {
    Single(String),
    Plural(BTreeMap<String, String>),
}

#[derive(Deserialize)]
struct RawEntry {
    id: String,
    translation: RawTranslation,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCatalog {
    List(Vec<RawEntry>),
    Map(BTreeMap<String, RawTranslation>),
}

impl From<RawTranslation> for Message {
    fn from(raw: RawTranslation) -> Self {
        match raw {
            RawTranslation::Single(s) => Self::Single(s),
            RawTranslation::Plural(forms) => Self::Plural(
                forms
                    .into_iter()
                    .filter_map(|(name, template)| {
                        PluralCategory::parse(&name).map(|c| (c, template))
                    })
                    .collect(),
            ),
        }
    }
}

/// All messages for one locale.
#[derive(Debug, Clone)]
pub struct Catalog {
    tag: LanguageTag,
    messages: HashMap<String, Message>,
}

impl Catalog {
    #[must_use]
    pub fn new(tag: LanguageTag, messages: HashMap<String, Message>) -> Self {
        Self { tag, messages }
    }

    /// Parses a catalog asset for `locale`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLoadError::UnparseableLocale`] for an invalid tag
    /// and [`CatalogLoadError::Parse`] for malformed JSON.
    pub fn from_json(locale: &str, bytes: &[u8]) -> Result<Self, CatalogLoadError> {
        let tag = LanguageTag::parse(locale)
            .ok_or_else(|| CatalogLoadError::UnparseableLocale(locale.to_string()))?;
        let raw: RawCatalog =
            serde_json::from_slice(bytes).map_err(|source| CatalogLoadError::Parse {
                locale: locale.to_string(),
                source,
            })?;
        let messages = match raw {
            RawCatalog::List(entries) => entries
                .into_iter()
                .map(|e| (e.id, Message::from(e.translation)))
                .collect(),
            RawCatalog::Map(map) => map
                .into_iter()
                .map(|(id, t)| (id, Message::from(t)))
                .collect(),
        };
        Ok(Self { tag, messages })
    }

    #[must_use]
    pub fn tag(&self) -> &LanguageTag {
        &self.tag
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Loader seam
// ---------------------------------------------------------------------------

/// Returns the parsed catalog for a locale name.
pub trait CatalogLoader: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`CatalogLoadError`] if the asset is missing, empty or
    /// malformed.
    fn load(&self, locale: &str) -> Result<Catalog, CatalogLoadError>;
}

type AssetFn = Box<dyn Fn(&str) -> io::Result<Vec<u8>> + Send + Sync>;

/// Loads `<resources_path>/<locale>.all.json` through an asset function.
pub struct AssetCatalogLoader {
    resources_path: PathBuf,
    asset: AssetFn,
}

impl AssetCatalogLoader {
    /// Uses `asset` to fetch bytes by key (e.g. an embedded asset table).
    pub fn from_fn(
        resources_path: impl Into<PathBuf>,
        asset: impl Fn(&str) -> io::Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            resources_path: resources_path.into(),
            asset: Box::new(asset),
        }
    }

    /// Reads assets from the filesystem relative to `root`.
    pub fn from_dir(root: impl Into<PathBuf>, resources_path: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::from_fn(resources_path, move |key| std::fs::read(root.join(key)))
    }

    /// The asset key for `locale`.
    #[must_use]
    pub fn asset_key(&self, locale: &str) -> String {
        Path::new(&self.resources_path)
            .join(format!("{locale}.all.json"))
            .to_string_lossy()
            .into_owned()
    }
}

impl std::fmt::Debug for AssetCatalogLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCatalogLoader")
            .field("resources_path", &self.resources_path)
            .finish_non_exhaustive()
    }
}

impl CatalogLoader for AssetCatalogLoader {
    fn load(&self, locale: &str) -> Result<Catalog, CatalogLoadError> {
        let key = self.asset_key(locale);
        let bytes = (self.asset)(&key).map_err(|source| CatalogLoadError::Asset {
            key: key.clone(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(CatalogLoadError::Empty { key });
        }
        Catalog::from_json(locale, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_form_with_plurals() {
        let json = br#"[
            {"id": "hello", "translation": "Hello"},
            {"id": "items", "translation": {"one": "{{.Count}} item", "other": "{{.Count}} items"}}
        ]"#;
        let catalog = Catalog::from_json("en-US", json).unwrap();
        assert_eq!(catalog.tag().as_str(), "en-us");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("hello").unwrap().form(None), "Hello");
        let items = catalog.get("items").unwrap();
        assert_eq!(items.form(Some(PluralCategory::One)), "{{.Count}} item");
        assert_eq!(items.form(Some(PluralCategory::Few)), "{{.Count}} items");
    }

    #[test]
    fn parses_map_form() {
        let catalog = Catalog::from_json("de", br#"{"hello": "Hallo"}"#).unwrap();
        assert_eq!(catalog.get("hello"), Some(&Message::Single("Hallo".to_string())));
    }

    #[test]
    fn unknown_plural_categories_are_dropped() {
        let json = br#"{"x": {"lots": "ignored", "other": "kept"}}"#;
        let catalog = Catalog::from_json("en", json).unwrap();
        let Message::Plural(forms) = catalog.get("x").unwrap() else {
            panic!("expected plural message");
        };
        assert_eq!(forms.len(), 1);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Catalog::from_json("en", b"{not json").unwrap_err();
        assert!(matches!(err, CatalogLoadError::Parse { .. }));
    }

    #[test]
    fn plural_rules_per_language() {
        assert_eq!(PluralCategory::for_count("en", 1.0), PluralCategory::One);
        assert_eq!(PluralCategory::for_count("en", 0.0), PluralCategory::Other);
        assert_eq!(PluralCategory::for_count("en", 1.5), PluralCategory::Other);
        assert_eq!(PluralCategory::for_count("fr", 0.0), PluralCategory::One);
        assert_eq!(PluralCategory::for_count("fr", 2.0), PluralCategory::Other);
        assert_eq!(PluralCategory::for_count("ja", 1.0), PluralCategory::Other);
    }

    #[test]
    fn asset_loader_reports_missing_and_empty_assets() {
        let loader = AssetCatalogLoader::from_fn("i18nResources", |key| match key {
            "i18nResources/en.all.json" => Ok(br#"{"hi": "Hi"}"#.to_vec()),
            "i18nResources/nl.all.json" => Ok(Vec::new()),
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "no such asset")),
        });

        assert_eq!(loader.load("en").unwrap().len(), 1);
        assert!(matches!(loader.load("nl"), Err(CatalogLoadError::Empty { .. })));
        assert!(matches!(loader.load("sv"), Err(CatalogLoadError::Asset { .. })));
    }
}

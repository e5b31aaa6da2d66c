//! Locale-aware translation.
//!
//! [`I18n`] is built once at startup from an [`I18nConfig`] and a
//! [`CatalogLoader`]; per request it resolves [`LocaleSignals`] to a shared
//! [`LocaleTranslator`].

pub mod catalog;
pub mod locale;
pub mod message;
pub mod translator;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

pub use catalog::{AssetCatalogLoader, Catalog, CatalogLoadError, CatalogLoader, Message, PluralCategory};
pub use locale::{parse_preferences, LanguageTag, LocaleSignals};
pub use translator::{
    DataBoundTranslator, DeferredTranslation, DeferredTranslator, LocaleTranslator,
    SafeTranslator, TranslationArgs,
};

/// Translation settings.
#[derive(Debug, Clone)]
pub struct I18nConfig {
    /// Locale used when no request signal matches. Must load successfully.
    pub default_language: String,
    /// Locales to load at startup.
    pub languages: Vec<String>,
    /// Directory prefix of the catalog assets.
    pub resources_path: String,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            languages: vec!["en".to_string()],
            resources_path: "i18nResources".to_string(),
        }
    }
}

/// Startup misconfiguration.
#[derive(Debug, thiserror::Error)]
pub enum I18nError {
    #[error("default language {0:?} is not a parseable language")]
    UnparseableDefault(String),
    #[error("default language {0:?} was not loaded")]
    DefaultLocaleMissing(String),
}

/// The set of loaded locales.
#[derive(Debug)]
pub struct I18n {
    translators: HashMap<String, Arc<LocaleTranslator>>,
    default: Arc<LocaleTranslator>,
}

impl I18n {
    /// Loads every configured locale. Locales that fail to load are logged
    /// and skipped.
    ///
    /// # Errors
    ///
    /// Fails when the default language is unparseable or did not load.
    pub fn load(config: &I18nConfig, loader: &dyn CatalogLoader) -> Result<Self, I18nError> {
        let mut catalogs = Vec::with_capacity(config.languages.len());
        for name in &config.languages {
            if LanguageTag::parse(name).is_none() {
                warn!(locale = %name, "not a parseable language");
                continue;
            }
            match loader.load(name) {
                Ok(catalog) => {
                    info!(locale = %name, messages = catalog.len(), "loaded translations");
                    catalogs.push(catalog);
                }
                Err(e) => warn!(locale = %name, error = %e, "skipping locale"),
            }
        }
        Self::from_catalogs(&config.default_language, catalogs)
    }

    /// Builds a registry from already-parsed catalogs.
    ///
    /// # Errors
    ///
    /// Fails when no catalog matches `default_language`.
    pub fn from_catalogs(
        default_language: &str,
        catalogs: impl IntoIterator<Item = Catalog>,
    ) -> Result<Self, I18nError> {
        let translators: HashMap<_, _> = catalogs
            .into_iter()
            .map(|c| (c.tag().as_str().to_string(), Arc::new(LocaleTranslator::new(Arc::new(c)))))
            .collect();
        let default_tag = LanguageTag::parse(default_language)
            .ok_or_else(|| I18nError::UnparseableDefault(default_language.to_string()))?;
        let default = translators
            .get(default_tag.as_str())
            .cloned()
            .ok_or_else(|| I18nError::DefaultLocaleMissing(default_language.to_string()))?;
        Ok(Self {
            translators,
            default,
        })
    }

    /// Tags of every loaded locale, sorted.
    #[must_use]
    pub fn locales(&self) -> Vec<&str> {
        let mut tags: Vec<_> = self.translators.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    #[must_use]
    pub fn default_translator(&self) -> &Arc<LocaleTranslator> {
        &self.default
    }

    /// Picks the translator for a request: the first candidate (cookie, then
    /// header) that matches a loaded locale directly or through one of its
    /// prefixes wins; otherwise the default.
    #[must_use]
    pub fn resolve(&self, signals: &LocaleSignals) -> Arc<LocaleTranslator> {
        for candidate in signals.candidates() {
            for tag in candidate.fallbacks() {
                if let Some(translator) = self.translators.get(tag) {
                    debug!(requested = %candidate, locale = tag, "resolved request locale");
                    return Arc::clone(translator);
                }
            }
        }
        debug!(locale = self.default.locale(), "falling back to default locale");
        Arc::clone(&self.default)
    }
}

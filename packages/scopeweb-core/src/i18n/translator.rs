//! Translator layers.
//!
//! Strictly layered: [`LocaleTranslator`] (locale-resolved base) ->
//! [`DataBoundTranslator`] (appends the render data as ambient context and
//! enforces arity) -> [`SafeTranslator`] (marks output as pre-escaped) ->
//! [`DeferredTranslator`] (captures the call for the final render pass).

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use super::catalog::{Catalog, PluralCategory};
use super::message::{interpolate, plural_count};
use crate::error::TranslationError;
use crate::render::{RenderData, SafeHtml};

/// The positional argument bundle of a translation call.
pub type TranslationArgs = Map<String, Value>;

fn single_positional<'a>(
    id: &str,
    args: &'a [TranslationArgs],
) -> Result<Option<&'a TranslationArgs>, TranslationError> {
    match args {
        [] => Ok(None),
        [one] => Ok(Some(one)),
        _ => {
            error!(id, count = args.len(), "translation called with too many arguments");
            Err(TranslationError::Arity {
                id: id.to_string(),
                count: args.len(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// LocaleTranslator
// ---------------------------------------------------------------------------

/// Base translator bound to one loaded catalog.
#[derive(Debug)]
pub struct LocaleTranslator {
    catalog: Arc<Catalog>,
}

impl LocaleTranslator {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// The tag of the catalog this translator resolves against.
    #[must_use]
    pub fn locale(&self) -> &str {
        self.catalog.tag().as_str()
    }

    /// Resolves `id` and substitutes `args`, then `ambient`.
    ///
    /// Unknown ids render as the id itself.
    #[must_use]
    pub fn translate(&self, id: &str, args: Option<&TranslationArgs>, ambient: &TranslationArgs) -> String {
        let Some(message) = self.catalog.get(id) else {
            debug!(id, locale = self.locale(), "no translation for message id");
            return id.to_string();
        };
        let category = plural_count(args)
            .map(|count| PluralCategory::for_count(self.catalog.tag().language(), count));
        interpolate(message.form(category), args, ambient)
    }
}

// ---------------------------------------------------------------------------
// DataBoundTranslator / SafeTranslator
// ---------------------------------------------------------------------------

/// Plain-string translator with the render data appended as ambient data.
#[derive(Clone, Copy)]
pub struct DataBoundTranslator<'a> {
    base: &'a LocaleTranslator,
    data: &'a RenderData,
}

impl<'a> DataBoundTranslator<'a> {
    #[must_use]
    pub fn new(base: &'a LocaleTranslator, data: &'a RenderData) -> Self {
        Self { base, data }
    }

    /// Translates `id` with zero or one argument bundle.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError::Arity`] when more than one bundle is
    /// passed.
    pub fn translate(&self, id: &str, args: &[TranslationArgs]) -> Result<String, TranslationError> {
        let positional = single_positional(id, args)?;
        Ok(self.base.translate(id, positional, &self.data.ambient()))
    }
}

impl fmt::Debug for DataBoundTranslator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBoundTranslator")
            .field("locale", &self.base.locale())
            .finish_non_exhaustive()
    }
}

/// Marks data-bound output as pre-escaped.
///
/// Catalog text is operator-controlled and trusted. Ambient render data is
/// escaped before interpolation. Positional arguments are **not** escaped
/// here: callers passing user input must escape it first.
#[derive(Debug, Clone, Copy)]
pub struct SafeTranslator<'a> {
    inner: DataBoundTranslator<'a>,
}

impl<'a> SafeTranslator<'a> {
    #[must_use]
    pub fn new(inner: DataBoundTranslator<'a>) -> Self {
        Self { inner }
    }

    /// # Errors
    ///
    /// Returns [`TranslationError::Arity`] when more than one bundle is
    /// passed.
    pub fn translate(&self, id: &str, args: &[TranslationArgs]) -> Result<SafeHtml, TranslationError> {
        let positional = single_positional(id, args)?;
        let ambient = self.inner.data.escaped_ambient();
        Ok(SafeHtml::trusted(self.inner.base.translate(id, positional, &ambient)))
    }
}

// ---------------------------------------------------------------------------
// Deferred translations
// ---------------------------------------------------------------------------

/// Factory for [`DeferredTranslation`]s.
#[derive(Debug, Clone)]
pub struct DeferredTranslator {
    base: Arc<LocaleTranslator>,
}

impl DeferredTranslator {
    #[must_use]
    pub fn new(base: Arc<LocaleTranslator>) -> Self {
        Self { base }
    }

    /// Captures a translation call for the final render pass.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError::Arity`] when more than one bundle is
    /// passed.
    pub fn defer(&self, id: &str, args: &[TranslationArgs]) -> Result<DeferredTranslation, TranslationError> {
        let positional = single_positional(id, args)?;
        Ok(DeferredTranslation {
            id: id.to_string(),
            args: positional.cloned(),
            translator: Arc::clone(&self.base),
        })
    }
}

/// A translation whose resolution waits until every handler has
/// contributed its render data.
#[derive(Debug, Clone)]
pub struct DeferredTranslation {
    id: String,
    args: Option<TranslationArgs>,
    translator: Arc<LocaleTranslator>,
}

impl DeferredTranslation {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolves through the safe layer against `data` as it stands now.
    ///
    /// # Errors
    ///
    /// Propagates [`TranslationError`] from the translator layers.
    pub fn resolve(&self, data: &RenderData) -> Result<SafeHtml, TranslationError> {
        let bound = DataBoundTranslator::new(&self.translator, data);
        SafeTranslator::new(bound).translate(&self.id, self.args.as_slice())
    }
}

impl PartialEq for DeferredTranslation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.args == other.args
            && Arc::ptr_eq(&self.translator, &other.translator)
    }
}

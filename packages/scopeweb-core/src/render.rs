//! Render data: the template engine's direct input.
//!
//! Every value is tagged so the sanitizer can tell raw handler text from
//! already-safe markup without inspecting types at runtime.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TranslationError;
use crate::i18n::{
    DataBoundTranslator, DeferredTranslation, DeferredTranslator, LocaleTranslator,
    SafeTranslator, TranslationArgs,
};

/// Reserved key of the plain-string translator binding.
pub const PLAIN_TRANSLATOR_KEY: &str = "StringT";
/// Reserved key of the HTML-safe translator binding.
pub const SAFE_TRANSLATOR_KEY: &str = "SafeT";
/// Reserved key of the deferred translator factory binding.
pub const DEFERRED_TRANSLATOR_KEY: &str = "FutureT";

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Escapes the five HTML-significant characters; NUL becomes U+FFFD.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

/// Escapes every string in `value`, object keys included.
#[must_use]
pub fn escape_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_html(s)),
        Value::Array(items) => Value::Array(items.iter().map(escape_json).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| (escape_html(key), escape_json(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Markup that is safe to emit verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SafeHtml(String);

impl SafeHtml {
    /// Escapes untrusted text.
    #[must_use]
    pub fn escape(text: &str) -> Self {
        Self(escape_html(text))
    }

    /// Marks operator-controlled markup as safe without escaping it.
    #[must_use]
    pub fn trusted(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RenderValue
// ---------------------------------------------------------------------------

/// Which translator variant a reserved binding exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorKind {
    Plain,
    Safe,
    Deferred,
}

/// A translator bound into the template engine's callable namespace.
#[derive(Debug, Clone)]
pub struct TranslatorBinding {
    pub kind: TranslatorKind,
    pub translator: Arc<LocaleTranslator>,
}

impl PartialEq for TranslatorBinding {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && Arc::ptr_eq(&self.translator, &other.translator)
    }
}

/// A single render data entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderValue {
    /// Unescaped text contributed by a handler.
    Raw(String),
    /// Markup that is already safe.
    Safe(SafeHtml),
    /// A translation resolved during the final render pass.
    Deferred(DeferredTranslation),
    /// Structured data (numbers, records, lists) as a handler supplied it.
    Data(Value),
    /// Structured data whose strings have all been escaped.
    SafeData(Value),
    /// One of the three reserved translator bindings.
    Translator(TranslatorBinding),
}

impl RenderValue {
    /// `true` for values the sanitizer still has to process.
    #[must_use]
    pub fn needs_sanitizing(&self) -> bool {
        matches!(self, Self::Raw(_) | Self::Deferred(_) | Self::Data(_))
    }
}

impl From<String> for RenderValue {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

impl From<&str> for RenderValue {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<SafeHtml> for RenderValue {
    fn from(value: SafeHtml) -> Self {
        Self::Safe(value)
    }
}

impl From<DeferredTranslation> for RenderValue {
    fn from(value: DeferredTranslation) -> Self {
        Self::Deferred(value)
    }
}

/// JSON strings count as raw text; everything else is structured data.
impl From<Value> for RenderValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Raw(s),
            other => Self::Data(other),
        }
    }
}

impl From<bool> for RenderValue {
    fn from(value: bool) -> Self {
        Self::Data(Value::Bool(value))
    }
}

impl From<i64> for RenderValue {
    fn from(value: i64) -> Self {
        Self::Data(Value::from(value))
    }
}

// ---------------------------------------------------------------------------
// RenderData
// ---------------------------------------------------------------------------

/// String-keyed bag of values handed to the template engine.
///
/// Backed by a `BTreeMap` so iteration (and therefore deferred resolution)
/// is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderData {
    pub(crate) values: BTreeMap<String, RenderValue>,
}

impl RenderData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one under that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RenderValue>) -> Option<RenderValue> {
        self.values.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RenderValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<RenderValue> {
        self.values.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, RenderValue> {
        self.values.iter()
    }

    /// Safe markup under `key`, if the entry has been sanitized.
    #[must_use]
    pub fn safe(&self, key: &str) -> Option<&SafeHtml> {
        match self.values.get(key) {
            Some(RenderValue::Safe(html)) => Some(html),
            _ => None,
        }
    }

    /// `true` once no raw string, unescaped data or deferred translation remains.
    #[must_use]
    pub fn is_sanitized(&self) -> bool {
        !self.values.values().any(RenderValue::needs_sanitizing)
    }

    /// Installs the three reserved translator bindings for `translator`.
    pub fn install_translators(&mut self, translator: &Arc<LocaleTranslator>) {
        for (key, kind) in [
            (PLAIN_TRANSLATOR_KEY, TranslatorKind::Plain),
            (SAFE_TRANSLATOR_KEY, TranslatorKind::Safe),
            (DEFERRED_TRANSLATOR_KEY, TranslatorKind::Deferred),
        ] {
            let binding = TranslatorBinding {
                kind,
                translator: Arc::clone(translator),
            };
            self.values.insert(key.to_string(), RenderValue::Translator(binding));
        }
    }

    fn binding(&self, key: &'static str, kind: TranslatorKind) -> Result<&Arc<LocaleTranslator>, TranslationError> {
        match self.values.get(key) {
            Some(RenderValue::Translator(b)) if b.kind == kind => Ok(&b.translator),
            _ => Err(TranslationError::Unbound { key }),
        }
    }

    /// The plain-string translator, bound to this data.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError::Unbound`] if no translator was installed.
    pub fn plain_translator(&self) -> Result<DataBoundTranslator<'_>, TranslationError> {
        let base = self.binding(PLAIN_TRANSLATOR_KEY, TranslatorKind::Plain)?;
        Ok(DataBoundTranslator::new(base, self))
    }

    /// The HTML-safe translator, bound to this data.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError::Unbound`] if no translator was installed.
    pub fn safe_translator(&self) -> Result<SafeTranslator<'_>, TranslationError> {
        let base = self.binding(SAFE_TRANSLATOR_KEY, TranslatorKind::Safe)?;
        Ok(SafeTranslator::new(DataBoundTranslator::new(base, self)))
    }

    /// The deferred translator factory.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError::Unbound`] if no translator was installed.
    pub fn deferred_translator(&self) -> Result<DeferredTranslator, TranslationError> {
        let base = self.binding(DEFERRED_TRANSLATOR_KEY, TranslatorKind::Deferred)?;
        Ok(DeferredTranslator::new(Arc::clone(base)))
    }

    /// Shorthand for `plain_translator()?.translate(id, args)`.
    ///
    /// # Errors
    ///
    /// Propagates [`TranslationError`] from the binding lookup or an arity
    /// violation.
    pub fn t(&self, id: &str, args: &[TranslationArgs]) -> Result<String, TranslationError> {
        self.plain_translator()?.translate(id, args)
    }

    /// Shorthand for `deferred_translator()?.defer(id, args)`.
    ///
    /// # Errors
    ///
    /// Propagates [`TranslationError`] from the binding lookup or an arity
    /// violation.
    pub fn t_deferred(&self, id: &str, args: &[TranslationArgs]) -> Result<DeferredTranslation, TranslationError> {
        self.deferred_translator()?.defer(id, args)
    }

    /// The view of this data that message templates can reference.
    ///
    /// Deferred translations and translator bindings are not visible.
    #[must_use]
    pub fn ambient(&self) -> TranslationArgs {
        self.view(false)
    }

    /// Like [`RenderData::ambient`], with raw strings and unescaped data
    /// escaped so the result can be interpolated into markup.
    #[must_use]
    pub fn escaped_ambient(&self) -> TranslationArgs {
        self.view(true)
    }

    fn view(&self, escape: bool) -> TranslationArgs {
        self.values
            .iter()
            .filter_map(|(key, value)| {
                let visible = match value {
                    RenderValue::Raw(s) if escape => Value::String(escape_html(s)),
                    RenderValue::Raw(s) => Value::String(s.clone()),
                    RenderValue::Safe(html) => Value::String(html.as_str().to_string()),
                    RenderValue::Data(v) if escape => escape_json(v),
                    RenderValue::Data(v) | RenderValue::SafeData(v) => v.clone(),
                    RenderValue::Deferred(_) | RenderValue::Translator(_) => return None,
                };
                Some((key.clone(), visible))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a RenderData {
    type Item = (&'a String, &'a RenderValue);
    type IntoIter = btree_map::Iter<'a, String, RenderValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

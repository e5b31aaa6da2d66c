//! Errors raised while translating render data.

/// Translator contract violations. Both are caller bugs and abort the
/// request rather than rendering something wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    #[error("translation id {id:?} called with too many ({count}) arguments")]
    Arity { id: String, count: usize },
    #[error("no translator bound under reserved key {key:?}")]
    Unbound { key: &'static str },
}

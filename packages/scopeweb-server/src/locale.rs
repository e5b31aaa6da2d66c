//! Locale signals carried by an HTTP request.

use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::HeaderMap;
use scopeweb_core::LocaleSignals;

use crate::cookie::cookie_value;

/// Cookie holding an explicit language choice.
pub const LANG_COOKIE: &str = "lang";

/// Collects the `lang` cookie and the `Accept-Language` header.
#[must_use]
pub fn locale_signals(headers: &HeaderMap) -> LocaleSignals {
    LocaleSignals {
        cookie: cookie_value(headers, LANG_COOKIE).filter(|lang| !lang.is_empty()),
        accept_language: headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

//! Minimal `Cookie` / `Set-Cookie` handling.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use crate::config::SessionConfig;
use crate::error::SessionStoreError;

/// Value of the first cookie called `name` across all `Cookie` headers.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

/// Formats a `Set-Cookie` value for the session cookie.
///
/// # Errors
///
/// Returns [`SessionStoreError::Header`] if the value contains bytes that
/// are not allowed in a header.
pub fn session_cookie(config: &SessionConfig, value: &str) -> Result<HeaderValue, SessionStoreError> {
    let mut cookie = format!("{}={}; Path={}", config.cookie_name, value, config.path);
    if let Some(max_age) = config.max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age.as_secs()));
    }
    if config.http_only {
        cookie.push_str("; HttpOnly");
    }
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie.push_str("; SameSite=");
    cookie.push_str(config.same_site.as_str());
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Appends a `Set-Cookie` header.
pub fn append_set_cookie(headers: &mut HeaderMap, value: HeaderValue) {
    headers.append(SET_COOKIE, value);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::SameSite;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(COOKIE, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn finds_cookie_across_headers() {
        let map = headers(&["a=1; lang=fr", "session=abc.def"]);
        assert_eq!(cookie_value(&map, "lang").as_deref(), Some("fr"));
        assert_eq!(cookie_value(&map, "session").as_deref(), Some("abc.def"));
        assert_eq!(cookie_value(&map, "missing"), None);
    }

    #[test]
    fn strips_quotes_and_ignores_malformed_pairs() {
        let map = headers(&["junk; lang=\"de\""]);
        assert_eq!(cookie_value(&map, "lang").as_deref(), Some("de"));
    }

    #[test]
    fn session_cookie_defaults() {
        let value = session_cookie(&SessionConfig::default(), "v").unwrap();
        assert_eq!(value.to_str().unwrap(), "session=v; Path=/; HttpOnly; SameSite=Lax");
    }

    #[test]
    fn session_cookie_with_all_attributes() {
        let config = SessionConfig {
            max_age: Some(Duration::from_secs(3600)),
            secure: true,
            http_only: false,
            same_site: SameSite::Strict,
            ..SessionConfig::default()
        };
        let value = session_cookie(&config, "v").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "session=v; Path=/; Max-Age=3600; Secure; SameSite=Strict"
        );
    }
}

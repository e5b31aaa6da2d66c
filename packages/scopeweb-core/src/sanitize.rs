//! Render-time sanitizer.
//!
//! Runs once, immediately before the template engine reads the data:
//! raw strings and the strings nested in structured data are HTML-escaped,
//! then every deferred translation is
//! resolved (in key order) against the escaped data. All replacements are
//! computed on a working copy, so on error the caller's data is untouched
//! and no partially sanitized state is ever observable.

use tracing::debug;

use crate::error::TranslationError;
use crate::render::{escape_json, RenderData, RenderValue, SafeHtml};

/// Normalizes every raw string and deferred translation to safe markup and
/// escapes structured data into [`RenderValue::SafeData`].
///
/// Safe values, escaped data and translator bindings pass through, so
/// running the sanitizer again is a no-op.
///
/// # Errors
///
/// Propagates a [`TranslationError`] from a deferred translation.
pub fn sanitize(data: &mut RenderData) -> Result<(), TranslationError> {
    let mut working = data.clone();

    let mut escaped = 0_usize;
    for value in working.values.values_mut() {
        match value {
            RenderValue::Raw(text) => *value = RenderValue::Safe(SafeHtml::escape(text)),
            RenderValue::Data(structured) => *value = RenderValue::SafeData(escape_json(structured)),
            _ => continue,
        }
        escaped += 1;
    }

    let mut resolved = Vec::new();
    for (key, value) in &working.values {
        if let RenderValue::Deferred(deferred) = value {
            resolved.push((key.clone(), deferred.resolve(&working)?));
        }
    }
    let deferred = resolved.len();
    for (key, html) in resolved {
        working.values.insert(key, RenderValue::Safe(html));
    }

    debug!(escaped, deferred, "sanitized render data");
    *data = working;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::i18n::{Catalog, LocaleTranslator, TranslationArgs};

    fn data_with_translators() -> RenderData {
        let json = br#"{
            "welcome": "Welcome {{.name}} to {{.store}}",
            "title": "<h1>{{.heading}}</h1>"
        }"#;
        let catalog = Catalog::from_json("en", json).unwrap();
        let translator = Arc::new(LocaleTranslator::new(Arc::new(catalog)));
        let mut data = RenderData::new();
        data.install_translators(&translator);
        data
    }

    fn args(value: serde_json::Value) -> TranslationArgs {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn raw_strings_are_escaped() {
        let mut data = RenderData::new();
        data.insert("comment", "<script>alert('x')</script> & more");
        sanitize(&mut data).unwrap();
        assert_eq!(
            data.safe("comment").unwrap().as_str(),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; more"
        );
    }

    #[test]
    fn safe_values_pass_through_and_data_is_marked_escaped() {
        let mut data = RenderData::new();
        data.insert("markup", SafeHtml::trusted("<em>ok</em>"));
        data.insert("points", json!({"total": 3}));
        sanitize(&mut data).unwrap();
        assert_eq!(data.safe("markup").unwrap().as_str(), "<em>ok</em>");
        assert_eq!(data.get("points"), Some(&RenderValue::SafeData(json!({"total": 3}))));
        assert!(data.is_sanitized());
    }

    #[test]
    fn strings_nested_in_data_are_escaped() {
        let mut data = RenderData::new();
        data.insert(
            "results",
            json!([{"name": "<img src=x onerror=alert(1)>", "tags": ["a&b"]}]),
        );
        sanitize(&mut data).unwrap();
        assert_eq!(
            data.get("results"),
            Some(&RenderValue::SafeData(json!([
                {"name": "&lt;img src=x onerror=alert(1)&gt;", "tags": ["a&amp;b"]}
            ])))
        );

        let once = data.clone();
        sanitize(&mut data).unwrap();
        assert_eq!(data, once);
    }

    #[test]
    fn deferred_resolution_never_sees_raw_markup() {
        let mut data = data_with_translators();
        let deferred = data.t_deferred("welcome", &[]).unwrap();
        data.insert("greeting", deferred);
        data.insert("name", "<script>x</script>");
        data.insert("store", "Main St");

        sanitize(&mut data).unwrap();
        assert_eq!(
            data.safe("greeting").unwrap().as_str(),
            "Welcome &lt;script&gt;x&lt;/script&gt; to Main St"
        );
    }

    #[test]
    fn deferred_sees_sibling_added_later() {
        let mut data = data_with_translators();
        let deferred = data.t_deferred("welcome", &[args(json!({"name": "Ana"}))]).unwrap();
        data.insert("greeting", deferred);
        data.insert("store", "Main St");

        sanitize(&mut data).unwrap();
        assert_eq!(data.safe("greeting").unwrap().as_str(), "Welcome Ana to Main St");
    }

    #[test]
    fn deferred_resolution_sees_escaped_siblings() {
        let mut data = data_with_translators();
        let deferred = data.t_deferred("title", &[]).unwrap();
        data.insert("page_title", deferred);
        data.insert("heading", "Q&A");

        sanitize(&mut data).unwrap();
        assert_eq!(data.safe("page_title").unwrap().as_str(), "<h1>Q&amp;A</h1>");
        assert!(data.is_sanitized());
    }

    #[test]
    fn bindings_survive_sanitizing() {
        let mut data = data_with_translators();
        sanitize(&mut data).unwrap();
        assert!(data.safe_translator().is_ok());
        assert!(data.deferred_translator().is_ok());
    }

    #[test]
    fn running_twice_matches_running_once() {
        let mut data = data_with_translators();
        data.insert("a", "<b>");
        let deferred = data.t_deferred("welcome", &[]).unwrap();
        data.insert("w", deferred);
        sanitize(&mut data).unwrap();
        let once = data.clone();
        sanitize(&mut data).unwrap();
        assert_eq!(data, once);
    }

    proptest! {
        #[test]
        fn escaped_output_never_contains_raw_specials(text in ".*") {
            let mut data = RenderData::new();
            data.insert("v", text.clone());
            sanitize(&mut data).unwrap();
            let out = data.safe("v").unwrap().as_str().to_string();
            prop_assert!(!out.contains('<'));
            prop_assert!(!out.contains('>'));
            if text.contains('<') {
                prop_assert!(out.contains("&lt;"));
            }
            if text.contains('>') {
                prop_assert!(out.contains("&gt;"));
            }
            if text.contains('&') {
                prop_assert!(out.contains("&amp;"));
            }
            // Every ampersand left in the output starts an entity.
            prop_assert_eq!(out.matches('&').count(), out.matches(';').count() - text.matches(';').count());
        }

        #[test]
        fn sanitize_is_idempotent(values in proptest::collection::btree_map("[a-z]{1,6}", ".*", 0..8)) {
            let mut data = RenderData::new();
            for (k, v) in values {
                data.insert(k, v);
            }
            sanitize(&mut data).unwrap();
            let once = data.clone();
            sanitize(&mut data).unwrap();
            prop_assert_eq!(data, once);
        }
    }
}

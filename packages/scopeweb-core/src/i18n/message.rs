//! Message template interpolation.
//!
//! Placeholders have the form `{{.Name}}` or `{{.Customer.Name}}`. Each path
//! is looked up in the positional arguments first, then in the ambient
//! render data. Missing values render as the empty string.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::translator::TranslationArgs;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

fn lookup<'a>(root: &'a TranslationArgs, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitutes every placeholder in `template`.
#[must_use]
pub fn interpolate(template: &str, args: Option<&TranslationArgs>, ambient: &TranslationArgs) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let path = &caps[1];
            args.and_then(|a| lookup(a, path))
                .or_else(|| lookup(ambient, path))
                .map(display)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Reads the `Count` argument used for plural selection.
#[must_use]
pub fn plural_count(args: Option<&TranslationArgs>) -> Option<f64> {
    match args?.get("Count")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> TranslationArgs {
        match value {
            Value::Object(m) => m,
            _ => unreachable!("test helper takes objects"),
        }
    }

    #[test]
    fn args_shadow_ambient_values() {
        let args = map(json!({"name": "Ana"}));
        let ambient = map(json!({"name": "ignored", "store": "Main St"}));
        let out = interpolate("Hi {{.name}} at {{ .store }}", Some(&args), &ambient);
        assert_eq!(out, "Hi Ana at Main St");
    }

    #[test]
    fn nested_paths_and_missing_values() {
        let ambient = map(json!({"customer": {"name": "Bo", "points": 12}}));
        let out = interpolate("{{.customer.name}}:{{.customer.points}}:{{.nope}}", None, &ambient);
        assert_eq!(out, "Bo:12:");
    }

    #[test]
    fn non_placeholder_braces_are_left_alone() {
        let out = interpolate("{{ not a path }}", None, &TranslationArgs::new());
        assert_eq!(out, "{{ not a path }}");
    }

    #[test]
    fn plural_count_accepts_numbers_and_numeric_strings() {
        assert_eq!(plural_count(Some(&map(json!({"Count": 3})))), Some(3.0));
        assert_eq!(plural_count(Some(&map(json!({"Count": "1"})))), Some(1.0));
        assert_eq!(plural_count(Some(&map(json!({"Count": true})))), None);
        assert_eq!(plural_count(None), None);
    }
}

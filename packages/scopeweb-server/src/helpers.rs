//! Small stateless helpers offered to templates.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::TemplateConfig;

/// CSS class for a voucher tile.
pub const ACTIVE_VOUCHER_CLASS: &str = "a-active-voucher";

/// Formats an amount with two decimals.
#[must_use]
pub fn format_money(amount: f64) -> String {
    format!("{amount:.2}")
}

/// `part` as a percentage of `whole`. A zero `whole` yields a non-finite
/// result.
#[must_use]
pub fn percentage(part: f64, whole: f64) -> f64 {
    (part * 100.0) / whole
}

/// First character of `s`, uppercased. Empty input stays empty.
#[must_use]
pub fn first_letter(s: &str) -> String {
    s.chars().next().map(|c| c.to_uppercase().collect()).unwrap_or_default()
}

#[must_use]
pub fn is_checked(value: &str, option: &str) -> bool {
    value == option
}

#[must_use]
pub fn voucher_class(active: bool) -> &'static str {
    if active {
        ACTIVE_VOUCHER_CLASS
    } else {
        ""
    }
}

/// Cache-busting prefix for static assets: `<root>static/<startup ts>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPaths {
    prefix: String,
}

impl StaticPaths {
    /// Prefix stamped with the current time. Build once at startup.
    #[must_use]
    pub fn new(config: &TemplateConfig) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self::at(config, now)
    }

    #[must_use]
    pub fn at(config: &TemplateConfig, unix_secs: u64) -> Self {
        Self {
            prefix: format!("{}static/{unix_secs}/", config.root),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// URL of the static asset at `path`.
    #[must_use]
    pub fn path(&self, path: &str) -> String {
        format!("{}{path}", self.prefix)
    }
}

//! Configuration types for the request-context server.
//!
//! Built once at startup and shared by `Arc`; nothing here is mutated after
//! construction.

use std::fmt;
use std::time::Duration;

use scopeweb_core::I18nConfig;

/// Session signing secret. Redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// `SameSite` attribute of the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cookie (and session) name.
    pub cookie_name: String,
    /// Secret the cookie MAC key is derived from.
    pub secret: Secret,
    pub path: String,
    /// `None` issues a browser-session cookie and never expires payloads.
    pub max_age: Option<Duration>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            secret: Secret::new(String::new()),
            path: "/".to_string(),
            max_age: None,
            http_only: true,
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

/// Settings for template rendering helpers.
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    /// URL root the static asset prefix is derived from (ends with `/`).
    pub root: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            root: "/".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub i18n: I18nConfig,
    pub templates: TemplateConfig,
}

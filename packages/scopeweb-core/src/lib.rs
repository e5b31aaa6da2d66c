//! `scopeweb` Core -- request scopes, render data, translation pipeline, and the render-time sanitizer.

pub mod bundle;
pub mod error;
pub mod i18n;
pub mod render;
pub mod sanitize;
pub mod scope;

pub use bundle::{ContextBundle, REQUEST_URI_KEY};
pub use error::TranslationError;
pub use i18n::{I18n, I18nConfig, I18nError, LocaleSignals, LocaleTranslator, TranslationArgs};
pub use render::{escape_html, escape_json, RenderData, RenderValue, SafeHtml};
pub use sanitize::sanitize;
pub use scope::{
    Business, CustomerRecord, CustomerScope, CustomerSummary, FormState, ProfileIdentity,
    ProfileScope, Promotion, SearchScope, SessionScope, Voucher, Wallet,
};

//! scopeweb server -- request-context middleware for axum.
//!
//! Wraps a router in [`RequestContextLayer`], which gives every request a
//! [`ContextBundle`](scopeweb_core::ContextBundle) hydrated from a signed
//! cookie session, installs the locale's translators, persists the scopes
//! on the way out and renders [`Page`] responses through a
//! [`TemplateEngine`].

pub mod config;
pub mod context;
pub mod cookie;
pub mod customer;
pub mod error;
pub mod helpers;
pub mod layer;
pub mod locale;
pub mod session;
pub mod template;

pub use config::{AppConfig, SameSite, Secret, SessionConfig, TemplateConfig};
pub use context::ContextHandle;
pub use customer::CustomerSource;
pub use error::{ContextError, SessionStoreError, TemplateRenderError};
pub use helpers::StaticPaths;
pub use layer::{RequestContext, RequestContextLayer, RequestContextService, SessionHook};
pub use locale::locale_signals;
pub use session::{CookieSessionStore, Session, SessionPersistence, SessionStore};
pub use template::{Page, TemplateEngine};

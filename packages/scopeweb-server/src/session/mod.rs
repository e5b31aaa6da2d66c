//! Session transport and the adapter between sessions and typed scopes.

pub mod persist;
pub mod store;

pub use persist::{
    load_profile_identity, load_search_scope, load_session_scope, save_profile_identity, save_search_scope,
    save_session_scope, FieldDecodeMismatch, SessionPersistence,
};
pub use store::{CookieSessionStore, Session, SessionStore, MAX_COOKIE_LEN};

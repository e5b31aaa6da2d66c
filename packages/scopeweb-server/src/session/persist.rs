//! Session persistence adapter.
//!
//! Translates between typed scopes and the session's loosely-typed fields.
//! Loading never fails: a missing field is its zero value, and a field with
//! an unexpected shape is logged and replaced by its zero value. The
//! loosely-typed form never leaves this module.

use std::sync::Arc;

use axum::http::HeaderMap;
use scopeweb_core::{
    Business, ContextBundle, CustomerSummary, ProfileIdentity, SearchScope, SessionScope,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::store::{Session, SessionStore};
use crate::config::SessionConfig;
use crate::cookie::{append_set_cookie, cookie_value, session_cookie};
use crate::error::SessionStoreError;

/// Stored field names. Changing one discards that field for every existing
/// session.
pub mod fields {
    pub const USER_ID: &str = "id";
    pub const USERNAME: &str = "username";
    pub const SESSION_KEY: &str = "session_key";
    pub const CHAIN_ID: &str = "chain_id";
    pub const CHAIN_NAME: &str = "chain_name";
    pub const ENVIRONMENT: &str = "environment";
    pub const BUSINESS_ID: &str = "business_id";
    pub const BUSINESS_NAME: &str = "business_name";
    pub const BUSINESSES: &str = "businesses";
    pub const SEARCH_QUERY: &str = "search_query";
    pub const SEARCH_RESULTS: &str = "search_results";
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const CUSTOMER_ENTITY_CODE: &str = "customer_entity_code";
}

/// A stored field whose value does not decode into the scope's type.
#[derive(Debug, thiserror::Error)]
#[error("session field {field:?} has an unexpected shape: {source}")]
pub struct FieldDecodeMismatch {
    pub field: &'static str,
    #[source]
    pub source: serde_json::Error,
}

fn decode_field<T: DeserializeOwned>(
    session: &Session,
    field: &'static str,
) -> Result<Option<T>, FieldDecodeMismatch> {
    session
        .get(field)
        .map(|value| T::deserialize(value).map_err(|source| FieldDecodeMismatch { field, source }))
        .transpose()
}

fn field_or_default<T: DeserializeOwned + Default>(session: &Session, field: &'static str) -> T {
    match decode_field(session, field) {
        Ok(value) => value.unwrap_or_default(),
        Err(mismatch) => {
            warn!(error = %mismatch, "using zero value for session field");
            T::default()
        }
    }
}

fn encode_field(session: &mut Session, field: &'static str, value: &impl Serialize) {
    match serde_json::to_value(value) {
        Ok(value) => session.set(field, value),
        // Scope fields are plain data; this only trips on a broken Serialize impl.
        Err(e) => warn!(field, error = %e, "could not encode session field"),
    }
}

// ---------------------------------------------------------------------------
// Per-scope load / save
// ---------------------------------------------------------------------------

/// Reads the session scope, consuming the stored flash messages.
pub fn load_session_scope(session: &mut Session) -> SessionScope {
    SessionScope {
        id: field_or_default(session, fields::USER_ID),
        username: field_or_default(session, fields::USERNAME),
        session_key: field_or_default(session, fields::SESSION_KEY),
        chain_id: field_or_default(session, fields::CHAIN_ID),
        chain_name: field_or_default(session, fields::CHAIN_NAME),
        environment: field_or_default(session, fields::ENVIRONMENT),
        business_id: field_or_default(session, fields::BUSINESS_ID),
        business_name: field_or_default(session, fields::BUSINESS_NAME),
        businesses: field_or_default::<Vec<Business>>(session, fields::BUSINESSES),
        flashes: session.take_flashes(),
        pending_flashes: Vec::new(),
    }
}

/// Writes every session scope field; queued flashes become the stored
/// flash list.
pub fn save_session_scope(scope: &SessionScope, session: &mut Session) {
    session.set(fields::USER_ID, scope.id);
    session.set(fields::USERNAME, scope.username.clone());
    session.set(fields::SESSION_KEY, scope.session_key.clone());
    session.set(fields::CHAIN_ID, scope.chain_id);
    session.set(fields::CHAIN_NAME, scope.chain_name.clone());
    session.set(fields::ENVIRONMENT, scope.environment.clone());
    session.set(fields::BUSINESS_ID, scope.business_id);
    session.set(fields::BUSINESS_NAME, scope.business_name.clone());
    encode_field(session, fields::BUSINESSES, &scope.businesses);
    session.set_flashes(scope.pending_flashes.clone());
}

#[must_use]
pub fn load_search_scope(session: &Session) -> SearchScope {
    SearchScope {
        query: field_or_default(session, fields::SEARCH_QUERY),
        results: field_or_default::<Vec<CustomerSummary>>(session, fields::SEARCH_RESULTS),
    }
}

/// Writes the search scope unless it is empty, so a request that ran no
/// search keeps the previous one. Returns whether anything was written.
pub fn save_search_scope(scope: &SearchScope, session: &mut Session) -> bool {
    if scope.is_empty() {
        debug!("empty search scope, keeping stored search");
        return false;
    }
    session.set(fields::SEARCH_QUERY, scope.query.clone());
    encode_field(session, fields::SEARCH_RESULTS, &scope.results);
    true
}

#[must_use]
pub fn load_profile_identity(session: &Session) -> ProfileIdentity {
    ProfileIdentity {
        customer_id: field_or_default(session, fields::CUSTOMER_ID),
        entity_code: field_or_default(session, fields::CUSTOMER_ENTITY_CODE),
    }
}

/// Stores only the identifying fields of the focused customer. An empty
/// identity removes them.
pub fn save_profile_identity(identity: &ProfileIdentity, session: &mut Session) {
    if identity.is_none() {
        session.remove(fields::CUSTOMER_ID);
        session.remove(fields::CUSTOMER_ENTITY_CODE);
        return;
    }
    session.set(fields::CUSTOMER_ID, Value::from(identity.customer_id));
    session.set(fields::CUSTOMER_ENTITY_CODE, identity.entity_code.clone());
}

// ---------------------------------------------------------------------------
// SessionPersistence
// ---------------------------------------------------------------------------

/// Opens, hydrates from, writes back to and commits the request's session.
#[derive(Clone)]
pub struct SessionPersistence {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
}

impl SessionPersistence {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: Arc<SessionConfig>) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Loads the session named by the config from the request cookies.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError`] if the store fails.
    pub async fn open(&self, headers: &HeaderMap) -> Result<Session, SessionStoreError> {
        let cookie = cookie_value(headers, &self.config.cookie_name);
        self.store.load(&self.config.cookie_name, cookie.as_deref()).await
    }

    /// Fills the persisted scopes of `bundle` from `session`.
    pub fn hydrate(&self, session: &mut Session, bundle: &mut ContextBundle) {
        bundle.session = load_session_scope(session);
        bundle.search = load_search_scope(session);
        bundle.profile.identity = load_profile_identity(session);
    }

    /// Writes the persisted scopes of `bundle` into `session`.
    pub fn write_back(&self, bundle: &ContextBundle, session: &mut Session) {
        save_session_scope(&bundle.session, session);
        save_search_scope(&bundle.search, session);
        save_profile_identity(&bundle.profile.identity, session);
    }

    /// Saves `session` and appends its `Set-Cookie` header.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError`] if the store fails or the cookie does
    /// not fit in a header.
    pub async fn commit(&self, session: &Session, headers: &mut HeaderMap) -> Result<(), SessionStoreError> {
        let value = self.store.save(session).await?;
        append_set_cookie(headers, session_cookie(&self.config, &value)?);
        Ok(())
    }

    /// [`write_back`](Self::write_back) followed by [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// See [`commit`](Self::commit).
    pub async fn persist(
        &self,
        bundle: &ContextBundle,
        session: &mut Session,
        headers: &mut HeaderMap,
    ) -> Result<(), SessionStoreError> {
        self.write_back(bundle, session);
        self.commit(session, headers).await
    }
}

impl std::fmt::Debug for SessionPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPersistence")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;
    use crate::config::Secret;
    use crate::session::CookieSessionStore;

    fn persistence() -> SessionPersistence {
        let config = Arc::new(SessionConfig {
            secret: Secret::new("persist-test"),
            ..SessionConfig::default()
        });
        let store = Arc::new(CookieSessionStore::new(&config.secret, None));
        SessionPersistence::new(store, config)
    }

    fn sample_scope() -> SessionScope {
        SessionScope {
            id: 9,
            username: "ana".to_string(),
            session_key: "k-1".to_string(),
            chain_id: 3,
            chain_name: "Chain".to_string(),
            environment: "staging".to_string(),
            business_id: 4,
            business_name: "North".to_string(),
            businesses: vec![Business {
                id: 4,
                name: "North".to_string(),
            }],
            ..SessionScope::default()
        }
    }

    /// Request headers carrying the cookie set on a previous response.
    fn next_request(response_headers: &HeaderMap) -> HeaderMap {
        let set_cookie = response_headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        headers
    }

    #[test]
    fn missing_fields_load_as_zero_values() {
        let mut session = Session::new("session");
        assert_eq!(load_session_scope(&mut session), SessionScope::default());
        assert_eq!(load_search_scope(&session), SearchScope::default());
        assert_eq!(load_profile_identity(&session), ProfileIdentity::default());
    }

    #[test]
    fn mismatched_fields_fall_back_individually() {
        let mut session = Session::new("session");
        session.set(fields::USER_ID, "not a number");
        session.set(fields::USERNAME, "ana");
        session.set(fields::BUSINESSES, json!([{"id": "x"}]));
        session.set(fields::CHAIN_ID, Value::Null);

        let scope = load_session_scope(&mut session);
        assert_eq!(scope.id, 0);
        assert_eq!(scope.username, "ana");
        assert!(scope.businesses.is_empty());
        assert_eq!(scope.chain_id, 0);
    }

    #[test]
    fn decode_field_reports_mismatch() {
        let mut session = Session::new("session");
        session.set(fields::CUSTOMER_ID, json!({"nested": true}));
        let err = decode_field::<i64>(&session, fields::CUSTOMER_ID).unwrap_err();
        assert_eq!(err.field, fields::CUSTOMER_ID);
    }

    #[test]
    fn flashes_are_read_once() {
        let mut session = Session::new("session");
        session.add_flash("Welcome back");
        let scope = load_session_scope(&mut session);
        assert_eq!(scope.flashes, vec!["Welcome back"]);
        assert!(session.flashes().is_empty());

        save_session_scope(&scope, &mut session);
        assert!(session.flashes().is_empty());
    }

    #[test]
    fn pending_flashes_are_stored() {
        let mut session = Session::new("session");
        let mut scope = SessionScope::default();
        scope.add_flash("Profile saved");
        save_session_scope(&scope, &mut session);
        save_session_scope(&scope, &mut session);
        assert_eq!(session.flashes(), ["Profile saved".to_string()]);
    }

    #[test]
    fn empty_search_keeps_previous_search() {
        let mut session = Session::new("session");
        let previous = SearchScope::new(
            "ana",
            vec![CustomerSummary {
                id: 1,
                entity_code: "C-1".to_string(),
                name: "Ana".to_string(),
                email: String::new(),
            }],
        );
        assert!(save_search_scope(&previous, &mut session));
        assert!(!save_search_scope(&SearchScope::default(), &mut session));
        assert_eq!(load_search_scope(&session), previous);
    }

    #[test]
    fn search_with_query_and_no_results_overwrites() {
        let mut session = Session::new("session");
        save_search_scope(&SearchScope::new("ana", vec![CustomerSummary::default()]), &mut session);
        save_search_scope(&SearchScope::new("zed", Vec::new()), &mut session);
        let loaded = load_search_scope(&session);
        assert_eq!(loaded.query, "zed");
        assert!(loaded.results.is_empty());
    }

    #[test]
    fn profile_identity_round_trip_and_clear() {
        let mut session = Session::new("session");
        let identity = ProfileIdentity::new(77, "C-77");
        save_profile_identity(&identity, &mut session);
        assert_eq!(load_profile_identity(&session), identity);

        save_profile_identity(&ProfileIdentity::default(), &mut session);
        assert!(session.get(fields::CUSTOMER_ID).is_none());
        assert!(session.get(fields::CUSTOMER_ENTITY_CODE).is_none());
    }

    #[tokio::test]
    async fn save_of_load_is_idempotent_across_requests() {
        let persistence = persistence();

        let mut session = persistence.open(&HeaderMap::new()).await.unwrap();
        let mut bundle = ContextBundle::new("/");
        persistence.hydrate(&mut session, &mut bundle);
        bundle.session = sample_scope();
        bundle.profile.identity = ProfileIdentity::new(5, "C-5");
        let mut first_response = HeaderMap::new();
        persistence.persist(&bundle, &mut session, &mut first_response).await.unwrap();

        let snapshot = |headers: HeaderMap| {
            let persistence = persistence.clone();
            async move {
                let mut session = persistence.open(&headers).await.unwrap();
                let mut bundle = ContextBundle::new("/");
                persistence.hydrate(&mut session, &mut bundle);
                let mut response = HeaderMap::new();
                persistence.persist(&bundle, &mut session, &mut response).await.unwrap();
                (session.values().clone(), response)
            }
        };

        let (once, second_response) = snapshot(next_request(&first_response)).await;
        let (twice, _) = snapshot(next_request(&second_response)).await;
        assert_eq!(once, twice);
        assert_eq!(once.get(fields::USERNAME), Some(&json!("ana")));
        assert_eq!(once.get(fields::CUSTOMER_ID), Some(&json!(5)));
    }

    #[tokio::test]
    async fn commit_sets_session_cookie() {
        let persistence = persistence();
        let session = Session::new("session");
        let mut headers = HeaderMap::new();
        persistence.commit(&session, &mut headers).await.unwrap();
        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));
    }
}

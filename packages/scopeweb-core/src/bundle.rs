//! The per-request aggregate of render data and scopes.

use crate::render::RenderData;
use crate::scope::{CustomerScope, ProfileScope, SearchScope, SessionScope};

/// Render data key holding the request's path and query.
pub const REQUEST_URI_KEY: &str = "request_uri";

/// Everything one request carries through the handler chain.
///
/// Exactly one bundle exists per request and it is never shared with another
/// request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle {
    pub data: RenderData,
    pub session: SessionScope,
    pub search: SearchScope,
    pub profile: ProfileScope,
    pub customer: CustomerScope,
}

impl ContextBundle {
    /// An empty bundle seeded with the default render data.
    #[must_use]
    pub fn new(request_uri: &str) -> Self {
        let mut data = RenderData::new();
        data.insert(REQUEST_URI_KEY, request_uri);
        Self {
            data,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn session_scope(&self) -> &SessionScope {
        &self.session
    }

    pub fn set_session_scope(&mut self, scope: SessionScope) {
        self.session = scope;
    }

    #[must_use]
    pub fn search_scope(&self) -> &SearchScope {
        &self.search
    }

    pub fn set_search_scope(&mut self, scope: SearchScope) {
        self.search = scope;
    }

    #[must_use]
    pub fn profile_scope(&self) -> &ProfileScope {
        &self.profile
    }

    pub fn set_profile_scope(&mut self, scope: ProfileScope) {
        self.profile = scope;
    }

    #[must_use]
    pub fn customer_scope(&self) -> &CustomerScope {
        &self.customer
    }

    /// Replaces the customer scope and focuses the profile on its record.
    pub fn set_customer_scope(&mut self, scope: CustomerScope) {
        if let Some(identity) = scope.identity() {
            self.profile.identity = identity;
        }
        self.customer = scope;
    }
}

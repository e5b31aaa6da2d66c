//! The per-request context store.
//!
//! A [`ContextBundle`] is attached to the request as an extension. The
//! extension map is keyed by type, so no other component can collide with
//! it, and the bundle is dropped together with the request. A
//! [`ContextHandle`] is a cheap clone; the middleware keeps one while the
//! handler runs and sees every change the handler made.
//!
//! Handles are per request. The mutex is only contended when a handler
//! shares its own handle between tasks.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Request;
use parking_lot::{Mutex, MutexGuard};
use scopeweb_core::{
    ContextBundle, CustomerScope, ProfileScope, RenderData, SearchScope, SessionScope,
};
use tracing::debug;

use crate::customer::CustomerSource;
use crate::error::ContextError;

/// Shared access to the bundle of one request.
#[derive(Debug, Clone)]
pub struct ContextHandle(Arc<Mutex<ContextBundle>>);

impl ContextHandle {
    fn new(bundle: ContextBundle) -> Self {
        Self(Arc::new(Mutex::new(bundle)))
    }

    /// Locks the bundle. Do not hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, ContextBundle> {
        self.0.lock()
    }

    /// Runs `f` with exclusive access to the bundle.
    pub fn with<R>(&self, f: impl FnOnce(&mut ContextBundle) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// Runs `f` with exclusive access to the render data.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut RenderData) -> R) -> R {
        f(&mut self.0.lock().data)
    }

    /// Clones the bundle out of the handle.
    #[must_use]
    pub fn snapshot(&self) -> ContextBundle {
        self.0.lock().clone()
    }

    #[must_use]
    pub fn session_scope(&self) -> SessionScope {
        self.0.lock().session.clone()
    }

    pub fn set_session_scope(&self, scope: SessionScope) {
        self.0.lock().set_session_scope(scope);
    }

    #[must_use]
    pub fn search_scope(&self) -> SearchScope {
        self.0.lock().search.clone()
    }

    pub fn set_search_scope(&self, scope: SearchScope) {
        self.0.lock().set_search_scope(scope);
    }

    #[must_use]
    pub fn profile_scope(&self) -> ProfileScope {
        self.0.lock().profile.clone()
    }

    pub fn set_profile_scope(&self, scope: ProfileScope) {
        self.0.lock().set_profile_scope(scope);
    }

    #[must_use]
    pub fn customer_scope(&self) -> CustomerScope {
        self.0.lock().customer.clone()
    }

    pub fn set_customer_scope(&self, scope: CustomerScope) {
        self.0.lock().set_customer_scope(scope);
    }

    /// Fetches the focused customer from `source` into the customer scope.
    ///
    /// Does nothing when no customer is focused.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Customer`] if the lookup fails.
    pub async fn enrich_customer(&self, source: &dyn CustomerSource) -> Result<bool, ContextError> {
        let identity = self.0.lock().profile.identity.clone();
        if identity.is_none() {
            return Ok(false);
        }
        let scope = source
            .load_customer(&identity)
            .await
            .map_err(ContextError::Customer)?;
        debug!(customer_id = identity.customer_id, "customer scope loaded");
        self.set_customer_scope(scope);
        Ok(true)
    }
}

/// A fresh bundle for `request`, seeded with its path and query.
#[must_use]
pub fn create<B>(request: &Request<B>) -> ContextBundle {
    let uri = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path(), |pq| pq.as_str());
    ContextBundle::new(uri)
}

/// Attaches `bundle` to `request`, replacing any earlier bundle.
///
/// Handles obtained from the request before this call keep pointing at the
/// old bundle.
#[must_use]
pub fn attach<B>(mut request: Request<B>, bundle: ContextBundle) -> Request<B> {
    request.extensions_mut().insert(ContextHandle::new(bundle));
    request
}

/// The bundle attached to `request`.
///
/// # Errors
///
/// Returns [`ContextError::Missing`] if nothing was attached.
pub fn get<B>(request: &Request<B>) -> Result<ContextHandle, ContextError> {
    request
        .extensions()
        .get::<ContextHandle>()
        .cloned()
        .ok_or(ContextError::Missing)
}

impl<S> FromRequestParts<S> for ContextHandle
where
    S: Send + Sync,
{
    type Rejection = ContextError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ContextHandle>()
            .cloned()
            .ok_or(ContextError::Missing)
    }
}

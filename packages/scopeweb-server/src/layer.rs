//! Tower middleware that owns the request-context lifecycle.
//!
//! Per request, in order:
//! 1. open the session from the request cookie,
//! 2. create the bundle and install the locale's translators,
//! 3. hydrate the persisted scopes (and run the session hook),
//! 4. attach the bundle and call the inner service,
//! 5. persist the scopes and queue the session cookie, unless the response
//!    is a server error,
//! 6. if the handler returned a [`Page`], sanitize and render it.
//!
//! Any failure replaces the response with a generic 500. A server error
//! leaves the client's session cookie untouched, so flashes consumed by the
//! failed request are shown again on the next one.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use scopeweb_core::{sanitize, ContextBundle, I18n};
use tower::{Layer, Service};
use tracing::{debug, error, field, info_span, Instrument, Span};

use crate::context;
use crate::error::ContextError;
use crate::locale::locale_signals;
use crate::session::{Session, SessionPersistence};
use crate::template::{Page, TemplateEngine};

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Application callback run after hydration, before routing.
pub type SessionHook = Arc<dyn Fn(&mut ContextBundle, &Session) + Send + Sync>;

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// Shared, immutable collaborators of the context layer.
pub struct RequestContext {
    persistence: SessionPersistence,
    i18n: Arc<I18n>,
    templates: Arc<dyn TemplateEngine>,
    session_hook: Option<SessionHook>,
}

impl RequestContext {
    #[must_use]
    pub fn new(persistence: SessionPersistence, i18n: Arc<I18n>, templates: Arc<dyn TemplateEngine>) -> Self {
        Self {
            persistence,
            i18n,
            templates,
            session_hook: None,
        }
    }

    #[must_use]
    pub fn with_session_hook(mut self, hook: impl Fn(&mut ContextBundle, &Session) + Send + Sync + 'static) -> Self {
        self.session_hook = Some(Arc::new(hook));
        self
    }

    async fn handle<S>(&self, mut inner: S, request: Request<Body>) -> Result<Response, ContextError>
    where
        S: Service<Request<Body>, Response = Response, Error = Infallible>,
    {
        let mut session = self.persistence.open(request.headers()).await?;

        let mut bundle = context::create(&request);
        let translator = self.i18n.resolve(&locale_signals(request.headers()));
        Span::current().record("locale", translator.locale());
        bundle.data.install_translators(&translator);
        self.persistence.hydrate(&mut session, &mut bundle);
        if let Some(hook) = &self.session_hook {
            hook(&mut bundle, &session);
        }

        let request = context::attach(request, bundle);
        let handle = context::get(&request)?;
        let response = match inner.call(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let mut bundle = std::mem::take(&mut *handle.lock());
        let (mut parts, body) = response.into_parts();
        let page = parts.extensions.remove::<Page>();
        let status = page.as_ref().map_or(parts.status, Page::status);
        if status.is_server_error() {
            debug!(%status, "server error response, session not persisted");
        } else {
            self.persistence.persist(&bundle, &mut session, &mut parts.headers).await?;
        }

        let Some(page) = page else {
            debug!(status = %parts.status, "passing through handler response");
            return Ok(Response::from_parts(parts, body));
        };
        Span::current().record("template", page.template());

        sanitize(&mut bundle.data)?;
        let html = self.templates.render(page.template(), &bundle.data).map_err(|source| {
            error!(template = page.template(), error = %source, "template render failed");
            ContextError::TemplateRender {
                template: page.template().to_string(),
                source,
            }
        })?;

        parts.status = page.status();
        parts.headers.remove(CONTENT_LENGTH);
        parts.headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
        Ok(Response::from_parts(parts, Body::from(html)))
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("persistence", &self.persistence)
            .field("locales", &self.i18n.locales())
            .field("session_hook", &self.session_hook.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// RequestContextLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with the request-context lifecycle.
#[derive(Debug, Clone)]
pub struct RequestContextLayer {
    context: Arc<RequestContext>,
}

impl RequestContextLayer {
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextService {
            inner,
            context: Arc::clone(&self.context),
        }
    }
}

// ---------------------------------------------------------------------------
// RequestContextService
// ---------------------------------------------------------------------------

/// Service wrapper produced by [`RequestContextLayer`].
#[derive(Debug, Clone)]
pub struct RequestContextService<S> {
    inner: S,
    context: Arc<RequestContext>,
}

impl<S> Service<Request<Body>> for RequestContextService<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The clone may not be ready; hand the ready service to the future.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let context = Arc::clone(&self.context);
        let span = info_span!(
            "request_context",
            method = %request.method(),
            uri = %request.uri(),
            locale = field::Empty,
            template = field::Empty,
        );
        Box::pin(
            async move {
                Ok(context
                    .handle(inner, request)
                    .await
                    .unwrap_or_else(IntoResponse::into_response))
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

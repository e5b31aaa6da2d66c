//! Request-level errors.
//!
//! Every variant is fatal for the response it occurs in and maps to a
//! generic 500 page; details only go to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scopeweb_core::TranslationError;
use tracing::error;

/// Failure of the underlying session transport.
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("could not encode session {name:?}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("session {name:?} encodes to {len} bytes, over the {limit} byte limit")]
    TooLarge {
        name: String,
        len: usize,
        limit: usize,
    },
    #[error("session cookie is not a valid header value")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
    #[error("session backend failed: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Error returned by the template engine collaborator.
#[derive(Debug, thiserror::Error)]
pub enum TemplateRenderError {
    #[error("template not found: {0}")]
    NotFound(String),
    #[error("template execution failed: {0}")]
    Execution(String),
}

/// Everything that can abort a request in the context layer.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("request context accessed before it was attached")]
    Missing,
    #[error(transparent)]
    SessionStore(#[from] SessionStoreError),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error("execution of template {template:?} failed: {source}")]
    TemplateRender {
        template: String,
        #[source]
        source: TemplateRenderError,
    },
    #[error("customer lookup failed: {0}")]
    Customer(anyhow::Error),
}

impl IntoResponse for ContextError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed in context layer");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_is_a_generic_500() {
        let errors = [
            ContextError::Missing,
            ContextError::Translation(TranslationError::Arity {
                id: "x".to_string(),
                count: 2,
            }),
            ContextError::TemplateRender {
                template: "home".to_string(),
                source: TemplateRenderError::NotFound("home".to_string()),
            },
        ];
        for err in errors {
            assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn template_error_message_names_template() {
        let err = ContextError::TemplateRender {
            template: "search/results".to_string(),
            source: TemplateRenderError::Execution("bad pipe".to_string()),
        };
        assert!(err.to_string().contains("\"search/results\""));
    }
}

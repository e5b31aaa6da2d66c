//! The template engine seam and the render response marker.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scopeweb_core::RenderData;

use crate::error::TemplateRenderError;

/// Renders a named template from sanitized render data.
///
/// Implementations receive data in which every string is safe markup, and
/// find the three translator bindings under their reserved keys.
pub trait TemplateEngine: Send + Sync {
    /// # Errors
    ///
    /// Returns [`TemplateRenderError`] if the template is unknown or fails.
    fn render(&self, template: &str, data: &RenderData) -> Result<String, TemplateRenderError>;
}

/// Handler response asking the context layer to render `template` with the
/// request's render data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    template: String,
    status: StatusCode,
}

impl Page {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            status: StatusCode::OK,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Produces an empty response carrying the marker; the body is filled in by
/// the context layer.
impl IntoResponse for Page {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; the error body is
//! `{"error": …, "code": …, "request_id": …}` with the status taken from
//! [`yb_core::Error::http_status`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: yb_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: yb_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn inner(&self) -> &yb_core::Error {
        &self.inner
    }
}

impl From<yb_core::Error> for AppError {
    fn from(e: yb_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                code = self.inner.code(),
                error = %self.inner,
                request_id = self.request_id.as_deref().unwrap_or("-"),
                "Request failed"
            );
        } else {
            tracing::debug!(status = %status, code = self.inner.code(), error = %self.inner, "Request rejected");
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yb_core::Error;

    #[test]
    fn not_found_produces_404() {
        let response = AppError::new(Error::not_found("abc")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (Error::RestrictedContent("x".into()), StatusCode::FORBIDDEN),
            (Error::upstream("x"), StatusCode::BAD_GATEWAY),
            (Error::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (Error::tool("yt-dlp", "x"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::InvalidPolicy("x".into()), StatusCode::BAD_REQUEST),
            (Error::ExpiredLinkExhausted("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::new(err).into_response().status(), status);
        }
    }

    #[test]
    fn with_request_id() {
        let err = AppError::new(Error::Internal("oops".into())).with_request_id("req-123".into());
        assert_eq!(err.request_id.as_deref(), Some("req-123"));
        assert_eq!(err.inner().code(), "internal_error");
    }
}

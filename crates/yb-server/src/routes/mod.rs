//! Route handlers for the HTTP API.

pub mod formats;
pub mod health;
pub mod hls;
pub mod item;
pub mod play;
pub mod resolve;

use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Map a core error into an [`AppError`] carrying the request's id.
pub(crate) fn tagged(id: &RequestId) -> impl Fn(yb_core::Error) -> AppError + '_ {
    move |e| AppError::new(e).with_request_id(id.0.clone())
}

/// Interpret a boolean query flag (`1`, `true`, `yes`, `on`).
pub(crate) fn flag(value: Option<&str>) -> Option<bool> {
    value.map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

//! Unified error type for ytbridge.
//!
//! The resolver, coordinator and playback proxy all fail with [`Error`]. Each
//! variant maps to a fixed HTTP status via [`Error::http_status`] and to a
//! stable machine-readable code via [`Error::code`].
//!
//! `Error` is `Clone` because the coordinator hands one resolution result to
//! every caller waiting on the same key.

use std::fmt;

/// Unified error type covering all failure modes in ytbridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The video identifier is unknown to the upstream provider.
    #[error("video not found: {0}")]
    NotFound(String),

    /// The video exists but is age, region or login gated.
    #[error("restricted content: {0}")]
    RestrictedContent(String),

    /// The upstream provider or the media host could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An operation did not complete within its configured timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The resolver tool exited abnormally or produced unusable output.
    #[error("tool error [{tool}]: {message}")]
    ToolFailure {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The requested format policy is not in the policy table.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// The upstream link was rejected again after a fresh resolution.
    #[error("upstream link expired again after re-resolution: {0}")]
    ExpiredLinkExhausted(String),

    /// Request data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::RestrictedContent(_) => 403,
            Error::UpstreamUnavailable(_) => 502,
            Error::Timeout(_) => 504,
            Error::ToolFailure { .. } => 500,
            Error::InvalidPolicy(_) => 400,
            Error::ExpiredLinkExhausted(_) => 502,
            Error::Validation(_) => 400,
            Error::Internal(_) => 500,
        }
    }

    /// Stable snake_case code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::RestrictedContent(_) => "restricted_content",
            Error::UpstreamUnavailable(_) => "upstream_unavailable",
            Error::Timeout(_) => "timeout",
            Error::ToolFailure { .. } => "tool_failure",
            Error::InvalidPolicy(_) => "invalid_policy",
            Error::ExpiredLinkExhausted(_) => "expired_link_exhausted",
            Error::Validation(_) => "validation_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_) | Error::Timeout(_))
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(id: impl fmt::Display) -> Self {
        Error::NotFound(id.to_string())
    }

    /// Convenience constructor for [`Error::ToolFailure`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::UpstreamUnavailable`].
    pub fn upstream(message: impl fmt::Display) -> Self {
        Error::UpstreamUnavailable(message.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(format!("io: {err}"))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

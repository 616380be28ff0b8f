//! Classification of resolver tool diagnostics.
//!
//! The tool reports failures as free text on stderr. Known fragments are
//! mapped onto the error taxonomy; anything unrecognised is a tool failure.

use yb_core::Error;

const NOT_FOUND: &[&str] = &[
    "video unavailable",
    "does not exist",
    "incomplete youtube id",
    "is not a valid url",
    "no video formats found",
    "http error 404",
    "this video has been removed",
];

const RESTRICTED: &[&str] = &[
    "sign in to confirm",
    "sign in to view",
    "age-restricted",
    "confirm your age",
    "inappropriate for some users",
    "private video",
    "members-only",
    "join this channel",
    "available in your country",
    "geo restriction",
    "geo-restricted",
    "blocked it in your country",
];

const NETWORK: &[&str] = &[
    "timed out",
    "temporarily unavailable",
    "temporary failure",
    "connection refused",
    "connection reset",
    "network is unreachable",
    "cannot assign requested address",
    "failed to resolve",
    "name or service not known",
    "tlsv1 alert",
    "proxy error",
    "transporterror",
    "http error 429",
    "http error 503",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// True when the diagnostics look like a network-level failure.
pub fn looks_like_network_failure(stderr: &str) -> bool {
    contains_any(&stderr.to_ascii_lowercase(), NETWORK)
}

/// Map tool diagnostics onto an [`Error`].
///
/// `detail` is the message carried by the resulting error, usually the tail
/// of stderr.
pub fn classify(tool: &str, stderr: &str, detail: &str) -> Error {
    let lower = stderr.to_ascii_lowercase();

    if contains_any(&lower, RESTRICTED) {
        Error::RestrictedContent(detail.to_string())
    } else if contains_any(&lower, NOT_FOUND) {
        Error::NotFound(detail.to_string())
    } else if contains_any(&lower, NETWORK) {
        Error::UpstreamUnavailable(format!("{tool} network error: {detail}"))
    } else {
        Error::tool(tool, detail)
    }
}

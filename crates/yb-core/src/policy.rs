//! Format selection policies.
//!
//! A [`Policy`] names one rule from a closed table. The rule itself is
//! evaluated by the resolver against the formats the tool reports; the proxy
//! only parses the name and carries it in the [`ResolutionKey`](crate::ResolutionKey).
//!
//! A [`Selector`] is what a request actually asks for: a policy, one exact
//! format, or an HLS manifest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Named format selection rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Muxed MP4 with H.264 video preferred, highest bitrate.
    #[default]
    H264Mp4,
    /// Highest bitrate muxed stream of any container.
    Best,
    /// Muxed WebM preferred.
    Webm,
    /// Lowest bitrate muxed stream.
    DataSaver,
}

impl Policy {
    /// Every policy in table order.
    pub const ALL: [Policy; 4] = [
        Policy::H264Mp4,
        Policy::Best,
        Policy::Webm,
        Policy::DataSaver,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::H264Mp4 => "h264_mp4",
            Policy::Best => "best",
            Policy::Webm => "webm",
            Policy::DataSaver => "data_saver",
        }
    }

    /// Parse an optional policy name, falling back to `default` when the
    /// name is absent or blank.
    pub fn parse_or(name: Option<&str>, default: Policy) -> Result<Policy, Error> {
        match name.map(str::trim) {
            None | Some("") => Ok(default),
            Some(n) => n.parse(),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264_mp4" => Ok(Policy::H264Mp4),
            "best" => Ok(Policy::Best),
            "webm" => Ok(Policy::Webm),
            "data_saver" => Ok(Policy::DataSaver),
            other => Err(Error::InvalidPolicy(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// HLS itag used by `/hls` when the client names none.
pub const DEFAULT_HLS_ITAG: &str = "94";

/// How a stream is picked from the formats the provider offers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Policy(Policy),
    /// One exact format by its format id or itag.
    Itag(String),
    /// An HLS manifest, preferring the given itag.
    Hls(String),
}

impl Selector {
    /// Build a selector from `/play` or `/resolve` query values. An explicit
    /// itag wins over the policy.
    pub fn from_query(policy: Option<&str>, itag: Option<&str>, default: Policy) -> Result<Self, Error> {
        match itag.map(str::trim).filter(|s| !s.is_empty()) {
            Some(itag) => Ok(Selector::Itag(validate_itag(itag)?.to_string())),
            None => Ok(Selector::Policy(Policy::parse_or(policy, default)?)),
        }
    }

    /// Selector for `/hls`.
    pub fn hls(itag: Option<&str>) -> Result<Self, Error> {
        let itag = itag
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_HLS_ITAG);
        Ok(Selector::Hls(validate_itag(itag)?.to_string()))
    }
}

fn validate_itag(itag: &str) -> Result<&str, Error> {
    let ok = itag.len() <= 32
        && itag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(itag)
    } else {
        Err(Error::Validation(format!("invalid itag: {itag:?}")))
    }
}

impl From<Policy> for Selector {
    fn from(policy: Policy) -> Self {
        Selector::Policy(policy)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Policy(p) => write!(f, "{p}"),
            Selector::Itag(itag) => write!(f, "itag:{itag}"),
            Selector::Hls(itag) => write!(f, "hls:{itag}"),
        }
    }
}

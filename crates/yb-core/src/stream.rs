//! Resolved stream records and the keys they are cached under.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::Selector;

// ---------------------------------------------------------------------------
// ResolutionKey
// ---------------------------------------------------------------------------

/// One cache slot and one coordination slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    pub video_id: String,
    pub selector: Selector,
}

impl ResolutionKey {
    pub fn new(video_id: impl Into<String>, selector: impl Into<Selector>) -> Self {
        Self {
            video_id: video_id.into(),
            selector: selector.into(),
        }
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.video_id, self.selector)
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Container of the selected stream.
///
/// Unknown extensions are kept verbatim so nothing the tool reports is lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Container {
    Mp4,
    Webm,
    ThreeGp,
    /// An HLS manifest rather than a media file.
    Hls,
    Other(String),
}

impl Container {
    /// Build from a file extension as reported by the resolver tool.
    pub fn from_ext(ext: &str) -> Self {
        match ext.trim().to_ascii_lowercase().as_str() {
            "mp4" | "m4v" | "m4a" => Container::Mp4,
            "webm" => Container::Webm,
            "3gp" => Container::ThreeGp,
            "m3u8" | "hls" => Container::Hls,
            other => Container::Other(other.to_string()),
        }
    }

    /// MIME type to fall back on when the upstream omits Content-Type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Container::Mp4 => "video/mp4",
            Container::Webm => "video/webm",
            Container::ThreeGp => "video/3gpp",
            Container::Hls => "application/vnd.apple.mpegurl",
            Container::Other(_) => "application/octet-stream",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::Mp4 => write!(f, "mp4"),
            Container::Webm => write!(f, "webm"),
            Container::ThreeGp => write!(f, "3gp"),
            Container::Hls => write!(f, "m3u8"),
            Container::Other(s) => write!(f, "{s}"),
        }
    }
}

impl From<String> for Container {
    fn from(s: String) -> Self {
        Container::from_ext(&s)
    }
}

impl From<Container> for String {
    fn from(c: Container) -> Self {
        c.to_string()
    }
}

// ---------------------------------------------------------------------------
// Record parts
// ---------------------------------------------------------------------------

/// Video and audio codec tags of the selected stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codecs {
    pub video: Option<String>,
    pub audio: Option<String>,
}

/// One chapter mark, in seconds from the start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub start: f64,
    pub end: f64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A caption track reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub lang: String,
    pub url: String,
    pub ext: String,
    /// True when the track is machine generated.
    #[serde(default)]
    pub auto: bool,
}

// ---------------------------------------------------------------------------
// StreamRecord
// ---------------------------------------------------------------------------

/// A resolved, currently playable stream for one video under one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub video_id: String,
    pub title: Option<String>,
    pub url: String,
    pub container: Container,
    pub codecs: Codecs,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub content_length: Option<u64>,
    /// Identifier of the format chosen by the policy, if any.
    pub format_id: Option<String>,
    pub thumbnails: Vec<Thumbnail>,
    pub subtitles: Vec<SubtitleTrack>,
    pub chapters: Vec<Chapter>,
    /// Request headers the upstream host expects.
    pub http_headers: BTreeMap<String, String>,
    pub resolved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StreamRecord {
    /// Stamp the record as resolved at `now` with the given lifetime.
    /// Expiry saturates at the latest representable instant.
    pub fn stamp(&mut self, now: DateTime<Utc>, lifetime: Duration) {
        self.resolved_at = now;
        self.expires_at = now
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// A record is live strictly before its expiry.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

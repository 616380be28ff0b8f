//! The resolver seam: turn a video identifier and selector into a
//! [`StreamRecord`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use yb_core::config::{CacheConfig, ResolverConfig};
use yb_core::{Chapter, Error, Result, Selector, StreamRecord, SubtitleTrack, Thumbnail};

use crate::extractor::Extractor;
use crate::info::VideoInfo;
use crate::select::{list_formats, select_for, FormatEntry};

/// Desktop browser user agent used when the tool reports none.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A formats listing together with the video title.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FormatListing {
    pub id: String,
    pub title: Option<String>,
    pub formats: Vec<FormatEntry>,
}

/// Resolves video identifiers. Invocations are expensive (seconds), which
/// is why callers go through the cache and coordinator.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve one identifier under one selector.
    async fn resolve(&self, video_id: &str, selector: &Selector) -> Result<StreamRecord>;

    /// List every format the provider offers for an identifier.
    async fn list_formats(&self, video_id: &str) -> Result<FormatListing>;
}

/// Reject identifiers that could not be a provider id. This keeps arbitrary
/// text out of the tool's argument list.
pub fn validate_video_id(video_id: &str) -> Result<()> {
    let ok = !video_id.is_empty()
        && video_id.len() <= 64
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid video id: {video_id:?}")))
    }
}

/// [`Resolver`] backed by the external tool.
#[derive(Debug, Clone)]
pub struct ToolResolver {
    extractor: Extractor,
    timeout: Duration,
    lifetime: chrono::Duration,
}

impl ToolResolver {
    pub fn new(extractor: Extractor, timeout: Duration, lifetime: chrono::Duration) -> Self {
        Self {
            extractor,
            timeout,
            lifetime,
        }
    }

    pub fn from_config(resolver: &ResolverConfig, cache: &CacheConfig) -> Result<Self> {
        Ok(Self::new(
            Extractor::from_config(resolver)?,
            resolver.timeout(),
            cache.lifetime(),
        ))
    }

    async fn dump(&self, video_id: &str) -> Result<VideoInfo> {
        validate_video_id(video_id)?;
        match tokio::time::timeout(self.timeout, self.extractor.dump(video_id)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "resolver did not finish within {:?}",
                self.timeout
            ))),
        }
    }

    fn build_record(&self, video_id: &str, selector: &Selector, info: VideoInfo) -> Result<StreamRecord> {
        let selection = select_for(&info, selector).ok_or_else(|| match selector {
            Selector::Policy(_) => {
                Error::tool("resolver", format!("no playable format reported for {video_id}"))
            }
            Selector::Itag(itag) => Error::not_found(format!("{video_id} (format {itag})")),
            Selector::Hls(_) => Error::not_found(format!("{video_id} (no HLS manifest)")),
        })?;

        let mut http_headers = selection.http_headers;
        if !http_headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("user-agent"))
        {
            http_headers.insert("User-Agent".into(), DEFAULT_USER_AGENT.into());
        }

        let now = Utc::now();
        let mut record = StreamRecord {
            video_id: video_id.to_string(),
            title: info.title.clone(),
            url: selection.url,
            container: selection.container,
            codecs: selection.codecs,
            duration: info.duration,
            content_length: selection.content_length,
            format_id: selection.format_id,
            thumbnails: thumbnails(&info),
            subtitles: subtitles(&info),
            chapters: chapters(&info),
            http_headers,
            resolved_at: now,
            expires_at: now,
        };
        record.stamp(now, self.lifetime);
        Ok(record)
    }
}

#[async_trait]
impl Resolver for ToolResolver {
    async fn resolve(&self, video_id: &str, selector: &Selector) -> Result<StreamRecord> {
        let started = std::time::Instant::now();
        let info = self.dump(video_id).await?;
        let record = self.build_record(video_id, selector, info)?;
        tracing::info!(
            video_id,
            %selector,
            format = record.format_id.as_deref().unwrap_or("-"),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resolved stream"
        );
        Ok(record)
    }

    async fn list_formats(&self, video_id: &str) -> Result<FormatListing> {
        let info = self.dump(video_id).await?;
        Ok(FormatListing {
            id: video_id.to_string(),
            title: info.title.clone(),
            formats: list_formats(&info),
        })
    }
}

// ---------------------------------------------------------------------------
// Record parts
// ---------------------------------------------------------------------------

fn thumbnails(info: &VideoInfo) -> Vec<Thumbnail> {
    let mut out: Vec<Thumbnail> = info
        .thumbnails
        .iter()
        .filter_map(|t| {
            Some(Thumbnail {
                url: t.url.clone()?,
                width: t.width.map(|w| w as u32),
                height: t.height.map(|h| h as u32),
            })
        })
        .collect();
    if out.is_empty() {
        if let Some(ref url) = info.thumbnail {
            out.push(Thumbnail {
                url: url.clone(),
                width: None,
                height: None,
            });
        }
    }
    out
}

/// Manual tracks for every language, plus the automatic track in the
/// video's original language (keyed `<lang>-orig`). WebVTT is preferred.
fn subtitles(info: &VideoInfo) -> Vec<SubtitleTrack> {
    let pick = |lang: &str, entries: &[crate::info::SubtitleInfo], auto: bool| {
        let entry = entries
            .iter()
            .find(|e| e.ext.as_deref() == Some("vtt") && e.url.is_some())
            .or_else(|| entries.iter().find(|e| e.url.is_some()))?;
        Some(SubtitleTrack {
            lang: lang.to_string(),
            url: entry.url.clone()?,
            ext: entry.ext.clone().unwrap_or_else(|| "vtt".into()),
            auto,
        })
    };

    let mut out: Vec<SubtitleTrack> = info
        .subtitles
        .iter()
        .filter(|(lang, _)| lang.as_str() != "live_chat")
        .filter_map(|(lang, entries)| pick(lang.as_str(), entries.as_slice(), false))
        .collect();

    for (lang, entries) in &info.automatic_captions {
        if let Some(base) = lang.strip_suffix("-orig") {
            if !out.iter().any(|t| t.lang == base) {
                out.extend(pick(base, entries.as_slice(), true));
            }
        }
    }
    out
}

fn chapters(info: &VideoInfo) -> Vec<Chapter> {
    let mut out: Vec<Chapter> = info
        .chapters
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|c| {
            let start = c.start_time?;
            Some(Chapter {
                start,
                end: c.end_time.unwrap_or(start),
                title: c.title.clone().unwrap_or_default(),
            })
        })
        .collect();
    out.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    out
}

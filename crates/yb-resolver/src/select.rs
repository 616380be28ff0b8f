//! Format selection and listing.
//!
//! [`select`] evaluates a [`Policy`] against the formats the tool reported.
//! Only muxed progressive formats (one URL carrying both audio and video) are
//! eligible, so the proxy can relay a single upstream resource. Every policy
//! falls back to the best muxed format, then to an HLS manifest, and finally
//! to the top-level URL.
//!
//! [`select_itag`] picks one exact format and [`select_hls`] picks a
//! manifest; [`select_for`] dispatches on a [`Selector`].
//!
//! [`list_formats`] produces the normalized listing served by `/formats`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use yb_core::{Codecs, Container, Policy, Selector};

use crate::info::{FormatInfo, VideoInfo};

/// The stream chosen for a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub url: String,
    pub container: Container,
    pub codecs: Codecs,
    pub format_id: Option<String>,
    pub content_length: Option<u64>,
    /// Format headers layered over the top-level ones.
    pub http_headers: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Format predicates
// ---------------------------------------------------------------------------

fn codec_present(codec: Option<&str>) -> bool {
    codec
        .map(|c| !c.is_empty() && !c.eq_ignore_ascii_case("none"))
        .unwrap_or(false)
}

/// A format carries video if it names a video codec, or if it has a height
/// or frame rate when the codec is omitted.
pub fn has_video(f: &FormatInfo) -> bool {
    match f.vcodec.as_deref() {
        Some(v) if v.eq_ignore_ascii_case("none") => false,
        v if codec_present(v) => true,
        _ => f.height.is_some() || f.fps.is_some(),
    }
}

/// A format carries audio if it names an audio codec, or reports an audio
/// bitrate or audio extension when the codec is omitted.
pub fn has_audio(f: &FormatInfo) -> bool {
    match f.acodec.as_deref() {
        Some(a) if a.eq_ignore_ascii_case("none") => false,
        a if codec_present(a) => true,
        _ => f.abr.is_some() || f.audio_ext.as_deref().is_some_and(|e| e != "none"),
    }
}

pub fn is_muxed(f: &FormatInfo) -> bool {
    has_video(f) && has_audio(f)
}

/// Storyboards and previews are image sheets, never playable media.
pub fn is_storyboard(f: &FormatInfo) -> bool {
    let lower = |s: &Option<String>| s.as_deref().unwrap_or("").trim().to_ascii_lowercase();
    let note = lower(&f.format_note);
    if lower(&f.protocol) == "mhtml" || lower(&f.ext) == "mhtml" {
        return true;
    }
    note.contains("storyboard") || note.contains("preview")
}

/// HLS itags in order of preference.
const HLS_ITAGS: [&str; 3] = ["94", "95", "96"];

/// Manifest URLs either live under `manifest/hls_playlist` or end in `.m3u8`.
pub fn is_hls_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    url.contains("manifest/hls_playlist") || path.ends_with(".m3u8")
}

/// A format whose URL is an HLS manifest rather than a media file.
pub fn is_hls(f: &FormatInfo) -> bool {
    let protocol = f.protocol.as_deref().unwrap_or("");
    protocol.starts_with("m3u8") || f.url.as_deref().is_some_and(is_hls_url)
}

fn format_key(f: &FormatInfo) -> Option<&str> {
    f.format_id.as_deref().or(f.itag.as_deref()).map(str::trim)
}

fn container_name(f: &FormatInfo) -> Option<&str> {
    f.container
        .as_deref()
        .map(|c| c.strip_suffix("_dash").unwrap_or(c))
        .or(f.ext.as_deref())
}

fn is_h264(f: &FormatInfo) -> bool {
    f.vcodec
        .as_deref()
        .map(|v| {
            let v = v.to_ascii_lowercase();
            v.starts_with("avc") || v.starts_with("h264")
        })
        .unwrap_or(false)
}

/// Total bitrate, falling back to video plus audio bitrate.
fn bitrate(f: &FormatInfo) -> Option<f64> {
    f.tbr.or_else(|| match (f.vbr, f.abr) {
        (None, None) => None,
        (v, a) => Some(v.unwrap_or(0.0) + a.unwrap_or(0.0)),
    })
}

fn height(f: &FormatInfo) -> Option<u32> {
    f.height.map(|h| h as u32).or_else(|| {
        let res = f.resolution.as_deref()?;
        let x = res.rfind('x')?;
        res[x + 1..].trim().parse().ok()
    })
}

fn by_bitrate(a: &&FormatInfo, b: &&FormatInfo) -> Ordering {
    let ka = bitrate(a).unwrap_or(0.0);
    let kb = bitrate(b).unwrap_or(0.0);
    ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Choose a stream for whatever `selector` asks for.
pub fn select_for(info: &VideoInfo, selector: &Selector) -> Option<Selection> {
    match selector {
        Selector::Policy(policy) => select(info, *policy),
        Selector::Itag(itag) => select_itag(info, itag),
        Selector::Hls(itag) => select_hls(info, Some(itag)),
    }
}

/// Choose a stream for `policy`, or `None` if nothing playable was reported.
pub fn select(info: &VideoInfo, policy: Policy) -> Option<Selection> {
    let muxed: Vec<&FormatInfo> = info
        .formats
        .iter()
        .filter(|f| f.url.is_some() && !is_storyboard(f) && !is_hls(f) && is_muxed(f))
        .collect();

    let in_container = |name: &str| {
        muxed
            .iter()
            .copied()
            .filter(|f| container_name(f).is_some_and(|c| c.eq_ignore_ascii_case(name)))
            .collect::<Vec<_>>()
    };

    let chosen = match policy {
        Policy::H264Mp4 => {
            let mp4s = in_container("mp4");
            let avc: Vec<&FormatInfo> = mp4s.iter().copied().filter(|f| is_h264(f)).collect();
            let pool = if avc.is_empty() { mp4s } else { avc };
            pool.into_iter().max_by(by_bitrate)
        }
        Policy::Best => None,
        Policy::Webm => in_container("webm").into_iter().max_by(by_bitrate),
        Policy::DataSaver => muxed.iter().copied().min_by(|a, b| {
            // Unknown bitrates sort last so a measured low one wins.
            let ka = bitrate(a).unwrap_or(f64::MAX);
            let kb = bitrate(b).unwrap_or(f64::MAX);
            ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
        }),
    }
    .or_else(|| muxed.iter().copied().max_by(by_bitrate));

    match chosen {
        Some(f) => Some(from_format(info, f)),
        None => select_hls(info, None).or_else(|| top_level(info)),
    }
}

/// The format whose id or itag is exactly `itag`. Adaptive formats are
/// returned as they are; nothing is remuxed.
pub fn select_itag(info: &VideoInfo, itag: &str) -> Option<Selection> {
    info.formats
        .iter()
        .filter(|f| f.url.is_some() && !is_storyboard(f))
        .find(|f| format_key(f) == Some(itag))
        .map(|f| from_format(info, f))
}

/// An HLS manifest: `preferred` if it names one, else itag 94, 95 or 96,
/// else the first manifest reported.
pub fn select_hls(info: &VideoInfo, preferred: Option<&str>) -> Option<Selection> {
    let manifests: Vec<&FormatInfo> = info
        .formats
        .iter()
        .filter(|f| f.url.is_some() && is_hls(f))
        .collect();

    let by_itag = |itag: &str| manifests.iter().copied().find(|f| format_key(f) == Some(itag));
    preferred
        .and_then(by_itag)
        .or_else(|| HLS_ITAGS.iter().find_map(|&itag| by_itag(itag)))
        .or_else(|| manifests.first().copied())
        .map(|f| from_format(info, f))
}

fn from_format(info: &VideoInfo, f: &FormatInfo) -> Selection {
    let mut http_headers = info.http_headers.clone();
    http_headers.extend(f.http_headers.iter().map(|(k, v)| (k.clone(), v.clone())));

    Selection {
        url: f.url.clone().unwrap_or_default(),
        container: if is_hls(f) {
            Container::Hls
        } else {
            Container::from_ext(container_name(f).unwrap_or("mp4"))
        },
        codecs: Codecs {
            video: f.vcodec.clone().filter(|v| codec_present(Some(v.as_str()))),
            audio: f.acodec.clone().filter(|a| codec_present(Some(a.as_str()))),
        },
        format_id: f.format_id.clone().or_else(|| f.itag.clone()),
        content_length: f.filesize.filter(|s| *s > 0.0).map(|s| s as u64),
        http_headers,
    }
}

fn top_level(info: &VideoInfo) -> Option<Selection> {
    let url = info.url.clone()?;
    let container = if is_hls_url(&url) {
        Container::Hls
    } else {
        Container::from_ext(info.ext.as_deref().unwrap_or("mp4"))
    };
    Some(Selection {
        url,
        container,
        codecs: Codecs {
            video: info.vcodec.clone().filter(|v| codec_present(Some(v.as_str()))),
            audio: info.acodec.clone().filter(|a| codec_present(Some(a.as_str()))),
        },
        format_id: None,
        content_length: info.filesize.filter(|s| *s > 0.0).map(|s| s as u64),
        http_headers: info.http_headers.clone(),
    })
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One row of the normalized format listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatEntry {
    pub itag: String,
    pub ext: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub tbr: Option<f64>,
    pub quality_label: Option<String>,
    pub url: Option<String>,
}

impl FormatEntry {
    pub fn is_progressive(&self) -> bool {
        self.has_video && self.has_audio
    }
}

/// Normalize the reported formats: storyboards and id-less entries are
/// dropped, progressive formats come first, then by height and bitrate
/// descending.
pub fn list_formats(info: &VideoInfo) -> Vec<FormatEntry> {
    let mut out: Vec<FormatEntry> = info
        .formats
        .iter()
        .filter(|f| !is_storyboard(f))
        .filter_map(|f| {
            let itag = f
                .format_id
                .as_deref()
                .or(f.itag.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty())?
                .to_string();
            let height = height(f);
            Some(FormatEntry {
                itag,
                ext: f.ext.as_ref().map(|e| e.to_ascii_lowercase()).filter(|e| !e.is_empty()),
                has_video: has_video(f),
                has_audio: has_audio(f),
                vcodec: f.vcodec.clone().filter(|v| !v.is_empty()),
                acodec: f.acodec.clone().filter(|a| !a.is_empty()),
                height,
                tbr: bitrate(f),
                quality_label: f
                    .quality_label
                    .clone()
                    .or_else(|| height.map(|h| format!("{h}p"))),
                url: f.url.clone(),
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.is_progressive()
            .cmp(&a.is_progressive())
            .then_with(|| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)))
            .then_with(|| {
                b.tbr
                    .unwrap_or(0.0)
                    .partial_cmp(&a.tbr.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal)
            })
    });
    out
}

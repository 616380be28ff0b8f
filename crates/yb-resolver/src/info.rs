//! The structured description the resolver tool prints with `-J`.
//!
//! Only the fields ytbridge consumes are modelled. Every field is optional
//! and numeric fields accept numbers or numeric strings (`"720"`, `"720p"`),
//! since extractors are inconsistent about both.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use yb_core::{Error, Result};

/// Top-level video description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    /// Direct URL when the extractor resolved a single format.
    pub url: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub filesize: Option<f64>,
    pub thumbnail: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub thumbnails: Vec<ThumbnailInfo>,
    #[serde(deserialize_with = "null_as_default")]
    pub formats: Vec<FormatInfo>,
    #[serde(deserialize_with = "null_as_default")]
    pub subtitles: BTreeMap<String, Vec<SubtitleInfo>>,
    #[serde(deserialize_with = "null_as_default")]
    pub automatic_captions: BTreeMap<String, Vec<SubtitleInfo>>,
    pub chapters: Option<Vec<ChapterInfo>>,
    #[serde(deserialize_with = "null_as_default")]
    pub http_headers: BTreeMap<String, String>,
    pub extractor: Option<String>,
    pub webpage_url: Option<String>,
}

/// One entry of `formats`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub format_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub itag: Option<String>,
    pub url: Option<String>,
    pub ext: Option<String>,
    pub container: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub fps: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub tbr: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub vbr: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub abr: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub filesize: Option<f64>,
    pub audio_ext: Option<String>,
    pub resolution: Option<String>,
    pub format_note: Option<String>,
    pub protocol: Option<String>,
    pub quality_label: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub http_headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThumbnailInfo {
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub width: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubtitleInfo {
    pub url: Option<String>,
    pub ext: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChapterInfo {
    #[serde(deserialize_with = "lenient_f64")]
    pub start_time: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub end_time: Option<f64>,
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse tool stdout into a [`VideoInfo`].
///
/// Clean JSON is tried first. If warnings leaked onto stdout, the span from
/// the first `{` to the last `}` is tried instead. A literal `null` or an
/// empty stream is a failure.
pub fn parse_tool_output(tool: &str, stdout: &str) -> Result<VideoInfo> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(Error::tool(tool, "returned no data"));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return from_value(tool, value);
    }

    let span = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return Err(Error::tool(tool, "output contained no JSON object")),
    };

    let value = serde_json::from_str::<Value>(span)
        .map_err(|e| Error::tool(tool, format!("failed to parse JSON output: {e}")))?;
    from_value(tool, value)
}

fn from_value(tool: &str, value: Value) -> Result<VideoInfo> {
    if !value.is_object() {
        return Err(Error::tool(tool, "returned JSON that is not an object"));
    }
    serde_json::from_value(value)
        .map_err(|e| Error::tool(tool, format!("unexpected JSON shape: {e}")))
}

// ---------------------------------------------------------------------------
// Lenient field deserializers
// ---------------------------------------------------------------------------

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            let s = s.strip_suffix('p').unwrap_or(&s);
            s.parse::<f64>().ok()
        }
        _ => None,
    }))
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "abc123",
        "title": "Sample",
        "duration": 212,
        "formats": [
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2",
             "height": 360, "tbr": 500.5, "url": "https://media.example/18"},
            {"format_id": 137, "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none",
             "height": "1080p", "url": "https://media.example/137"}
        ],
        "http_headers": {"User-Agent": "Mozilla/5.0"}
    }"#;

    #[test]
    fn parse_clean_json() {
        let info = parse_tool_output("yt-dlp", SAMPLE).unwrap();
        assert_eq!(info.id.as_deref(), Some("abc123"));
        assert_eq!(info.duration, Some(212.0));
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[1].format_id.as_deref(), Some("137"));
        assert_eq!(info.formats[1].height, Some(1080.0));
        assert_eq!(info.http_headers.get("User-Agent").map(String::as_str), Some("Mozilla/5.0"));
    }

    #[test]
    fn parse_noisy_output() {
        let noisy = format!("WARNING: something odd\n{SAMPLE}\n[info] done");
        let info = parse_tool_output("yt-dlp", &noisy).unwrap();
        assert_eq!(info.title.as_deref(), Some("Sample"));
    }

    #[test]
    fn empty_and_null_are_failures() {
        for out in ["", "  \n", "null", " null\n"] {
            let err = parse_tool_output("yt-dlp", out).unwrap_err();
            assert_eq!(err.code(), "tool_failure");
            assert!(err.to_string().contains("no data"));
        }
    }

    #[test]
    fn garbage_is_failure() {
        let err = parse_tool_output("yt-dlp", "ERROR: nothing here").unwrap_err();
        assert_eq!(err.code(), "tool_failure");
        let err = parse_tool_output("yt-dlp", "[1, 2, 3]").unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn null_fields_are_tolerated() {
        let info = parse_tool_output(
            "yt-dlp",
            r#"{"id": "x", "duration": null, "chapters": null, "thumbnails": null, "formats": [{"tbr": null, "height": "n/a"}]}"#,
        )
        .unwrap();
        assert!(info.duration.is_none());
        assert!(info.chapters.is_none());
        assert!(info.formats[0].height.is_none());
        assert!(info.thumbnails.is_empty());
    }
}

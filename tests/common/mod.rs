//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires a full [`AppContext`] around a
//! [`MockResolver`] and a wiremock media host. The resolver hands out links
//! on the media host numbered by resolution (`/media/{id}/{n}`), so tests can
//! tell a fresh link from a stale one. The [`TestHarness::with_server`]
//! constructors start Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use yb_core::config::Config;
use yb_core::{Codecs, Container, Error, Policy, Result, Selector, StreamRecord};
use yb_resolver::{FormatEntry, FormatListing, Resolver};
use yb_server::context::AppContext;
use yb_server::range::ByteRange;
use yb_server::router::build_router;

/// Manifest served for every `/hls/` link.
pub const MANIFEST: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:5\n#EXTINF:5.0,\nhttps://media.example/seg0.ts\n#EXT-X-ENDLIST\n";

/// Size of the fake media resource.
pub const MEDIA_LEN: usize = 1000;

/// Deterministic media bytes, so slices can be checked.
pub fn media_bytes() -> Vec<u8> {
    (0..MEDIA_LEN).map(|i| (i % 251) as u8).collect()
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolver double: counts calls, sleeps `delay` per call, and fails
/// `unknown123` with `NotFound`. Itag `999` is never offered; HLS selectors
/// get a manifest link (`/hls/{id}/{n}/index.m3u8`).
pub struct MockResolver {
    pub calls: AtomicUsize,
    media_base: String,
    delay: Duration,
    lifetime: chrono::Duration,
}

impl MockResolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve(&self, video_id: &str, selector: &Selector) -> Result<StreamRecord> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;

        if video_id == "unknown123" {
            return Err(Error::not_found(video_id));
        }

        let now = Utc::now();
        let mut record = StreamRecord {
            video_id: video_id.to_string(),
            title: Some(format!("Video {video_id}")),
            url: format!("{}/media/{video_id}/{n}", self.media_base),
            container: Container::Mp4,
            codecs: Codecs {
                video: Some("avc1.42001E".into()),
                audio: Some("mp4a.40.2".into()),
            },
            duration: Some(42.0),
            content_length: Some(MEDIA_LEN as u64),
            format_id: Some("18".into()),
            thumbnails: vec![],
            subtitles: vec![],
            chapters: vec![],
            http_headers: BTreeMap::from([("User-Agent".to_string(), "ytbridge-tests".to_string())]),
            resolved_at: now,
            expires_at: now + self.lifetime,
        };

        match selector {
            Selector::Policy(Policy::Webm) => record.container = Container::Webm,
            Selector::Policy(_) => {}
            Selector::Itag(itag) if itag == "999" => {
                return Err(Error::not_found(format!("{video_id} (format {itag})")));
            }
            Selector::Itag(itag) => record.format_id = Some(itag.clone()),
            Selector::Hls(itag) => {
                record.url = format!("{}/hls/{video_id}/{n}/index.m3u8", self.media_base);
                record.container = Container::Hls;
                record.content_length = None;
                record.format_id = Some(itag.clone());
            }
        }
        Ok(record)
    }

    async fn list_formats(&self, video_id: &str) -> Result<FormatListing> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if video_id == "unknown123" {
            return Err(Error::not_found(video_id));
        }
        Ok(FormatListing {
            id: video_id.to_string(),
            title: Some(format!("Video {video_id}")),
            formats: vec![FormatEntry {
                itag: "18".into(),
                ext: Some("mp4".into()),
                has_video: true,
                has_audio: true,
                vcodec: Some("avc1.42001E".into()),
                acodec: Some("mp4a.40.2".into()),
                height: Some(360),
                tbr: Some(500.0),
                quality_label: Some("360p".into()),
                url: None,
            }],
        })
    }
}

// ---------------------------------------------------------------------------
// Media host
// ---------------------------------------------------------------------------

/// Serves [`media_bytes`] honoring a single `Range` header.
pub struct MediaResponder {
    body: Vec<u8>,
}

impl Respond for MediaResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let total = self.body.len() as u64;
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(ByteRange::parse);

        let Some(range) = range else {
            return ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .insert_header("accept-ranges", "bytes")
                .insert_header("etag", "\"media-v1\"")
                .set_body_bytes(self.body.clone());
        };

        match range.resolve(total) {
            Some((start, end)) => ResponseTemplate::new(206)
                .insert_header("content-type", "video/mp4")
                .insert_header("accept-ranges", "bytes")
                .insert_header("content-range", format!("bytes {start}-{end}/{total}").as_str())
                .set_body_bytes(self.body[start as usize..=end as usize].to_vec()),
            None => ResponseTemplate::new(416)
                .insert_header("content-range", format!("bytes */{total}").as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Knobs for building a harness.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub delay: Duration,
    pub lifetime: chrono::Duration,
    pub config: Config,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        let mut config = Config::default();
        config.catalog.provider = "none".into();
        config.playback.connect_timeout_secs = 2;
        config.playback.response_timeout_secs = 5;
        config.playback.idle_timeout_secs = 5;
        Self {
            delay: Duration::ZERO,
            lifetime: chrono::Duration::hours(1),
            config,
        }
    }
}

pub struct TestHarness {
    pub ctx: AppContext,
    pub resolver: Arc<MockResolver>,
    pub media: MockServer,
}

impl TestHarness {
    /// Harness with default options.
    pub async fn new() -> Self {
        Self::with_options(HarnessOptions::default()).await
    }

    pub async fn with_options(opts: HarnessOptions) -> Self {
        let media = MockServer::start().await;
        Mock::given(path_regex("^/media/"))
            .respond_with(MediaResponder { body: media_bytes() })
            .mount(&media)
            .await;
        Mock::given(path_regex("^/hls/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string(MANIFEST),
            )
            .mount(&media)
            .await;

        let resolver = Arc::new(MockResolver {
            calls: AtomicUsize::new(0),
            media_base: media.uri(),
            delay: opts.delay,
            lifetime: opts.lifetime,
        });
        let ctx = AppContext::new(opts.config, resolver.clone()).expect("failed to build context");

        Self { ctx, resolver, media }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_options(HarnessOptions::default()).await
    }

    pub async fn with_server_options(opts: HarnessOptions) -> (Self, SocketAddr) {
        Self::with_options(opts).await.serve().await
    }

    /// Serve this harness, for tests that mount extra mocks first.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = build_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Requests the media host has seen for one resolution link.
    pub async fn media_hits(&self, video_id: &str, generation: usize) -> usize {
        let wanted = format!("/media/{video_id}/{generation}");
        self.media
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == wanted)
            .count()
    }
}

/// HTTP client that does not follow redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build client")
}

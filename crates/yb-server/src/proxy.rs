//! Playback proxy.
//!
//! A `/play` request walks a small state machine:
//!
//! ```text
//! START -> CACHE_LOOKUP -> UPSTREAM_FETCH -> STREAMING -> DONE
//!                               |   ^
//!                         403/410   | (once)
//!                               v   |
//!                           EXPIRED_RETRY
//! ```
//!
//! Any error ends in FAILED, which is the `Err` side of [`Proxy::serve`].
//! `START` is [`PlaybackRequest::new`]; the route handler runs it before
//! handing over.
//!
//! HLS manifests take the same path. They are relayed whole, without byte
//! ranges, as `application/vnd.apple.mpegurl`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::StreamExt;
use yb_core::config::PlaybackConfig;
use yb_core::{Container, Error, ResolutionKey, Result, Selector, StreamRecord};
use yb_resolver::validate_video_id;

use crate::coordinator::Coordinator;
use crate::range::{parse_content_range, ByteRange};

/// Response headers copied from the upstream media host.
const RELAYED_HEADERS: [HeaderName; 6] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
    header::LAST_MODIFIED,
    header::ETAG,
];

/// Conditional request headers forwarded upstream as-is.
const CONDITIONAL_HEADERS: [HeaderName; 3] = [
    header::IF_RANGE,
    header::IF_NONE_MATCH,
    header::IF_MODIFIED_SINCE,
];

pub static X_MODE: HeaderName = HeaderName::from_static("x-ytbridge-mode");
pub static X_FORMAT: HeaderName = HeaderName::from_static("x-ytbridge-format");
pub static X_CONTAINER: HeaderName = HeaderName::from_static("x-ytbridge-container");
pub static X_ATTEMPT: HeaderName = HeaderName::from_static("x-ytbridge-attempt");
pub static X_KIND: HeaderName = HeaderName::from_static("x-ytbridge-kind");

/// Manifests change as a live stream advances.
const MANIFEST_CACHE_CONTROL: &str = "private, max-age=30";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A parsed playback request.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub key: ResolutionKey,
    pub method: Method,
    pub range: Option<ByteRange>,
    /// Conditional headers from the client, already filtered.
    pub conditionals: HeaderMap,
    /// Answer with a redirect instead of proxying. `None` uses the
    /// configured mode.
    pub redirect: Option<bool>,
    pub debug: bool,
}

impl PlaybackRequest {
    /// Validate the identifier and pick out the request headers that matter
    /// upstream.
    pub fn new(video_id: &str, selector: Selector, method: Method, headers: &HeaderMap) -> Result<Self> {
        validate_video_id(video_id)?;

        let range = headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                let parsed = ByteRange::parse(v);
                if parsed.is_none() {
                    tracing::debug!(range = v, "ignoring unsupported range, serving full resource");
                }
                parsed
            });

        let mut conditionals = HeaderMap::new();
        for name in CONDITIONAL_HEADERS {
            if let Some(value) = headers.get(&name) {
                conditionals.insert(name, value.clone());
            }
        }

        Ok(Self {
            key: ResolutionKey::new(video_id, selector),
            method,
            range,
            conditionals,
            redirect: None,
            debug: false,
        })
    }

    pub fn with_redirect(mut self, redirect: Option<bool>) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

enum State {
    CacheLookup,
    UpstreamFetch {
        record: Arc<StreamRecord>,
        attempt: u32,
    },
    ExpiredRetry {
        stale: Arc<StreamRecord>,
        status: StatusCode,
    },
    Streaming {
        record: Arc<StreamRecord>,
        upstream: reqwest::Response,
        attempt: u32,
    },
}

/// Streams resolved media to clients.
#[derive(Debug, Clone)]
pub struct Proxy {
    client: reqwest::Client,
    response_timeout: Duration,
    idle_timeout: Duration,
    redirect: bool,
}

impl Proxy {
    pub fn new(
        connect_timeout: Duration,
        response_timeout: Duration,
        idle_timeout: Duration,
        redirect: bool,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build upstream client: {e}")))?;
        Ok(Self {
            client,
            response_timeout,
            idle_timeout,
            redirect,
        })
    }

    pub fn from_config(cfg: &PlaybackConfig) -> Result<Self> {
        Self::new(
            Duration::from_secs(cfg.connect_timeout_secs),
            Duration::from_secs(cfg.response_timeout_secs),
            Duration::from_secs(cfg.idle_timeout_secs),
            cfg.redirect(),
        )
    }

    /// Whether `/play` redirects by default.
    pub fn redirects(&self) -> bool {
        self.redirect
    }

    /// Run a playback request to a response or an error.
    pub async fn serve(&self, coordinator: &Coordinator, req: &PlaybackRequest) -> Result<Response> {
        let key = &req.key;
        let mut state = State::CacheLookup;

        loop {
            state = match state {
                State::CacheLookup => {
                    let record = coordinator.resolve_or_join(key).await?;
                    if req.redirect.unwrap_or(self.redirect) {
                        return redirect_response(&record, req);
                    }
                    State::UpstreamFetch { record, attempt: 0 }
                }

                State::UpstreamFetch { record, attempt } => {
                    if let Some(response) = unsatisfiable_range(&record, req) {
                        return Ok(response);
                    }
                    let upstream = self.fetch(&record, req, attempt).await?;
                    let status = upstream.status();
                    match status.as_u16() {
                        403 | 410 if attempt == 0 => State::ExpiredRetry { stale: record, status },
                        403 | 410 => {
                            tracing::warn!(
                                video_id = %key.video_id,
                                selector = %key.selector,
                                status = status.as_u16(),
                                "upstream rejected refreshed link"
                            );
                            return Err(Error::ExpiredLinkExhausted(format!(
                                "upstream answered {status} after re-resolving {key}"
                            )));
                        }
                        200..=299 | 304 | 416 => State::Streaming { record, upstream, attempt },
                        _ => {
                            return Err(Error::upstream(format!("media host answered {status} for {key}")));
                        }
                    }
                }

                State::ExpiredRetry { stale, status } => {
                    tracing::info!(
                        video_id = %key.video_id,
                        selector = %key.selector,
                        status = status.as_u16(),
                        "stream link expired, re-resolving"
                    );
                    coordinator.invalidate_stale(key, &stale);
                    let record = coordinator.resolve_or_join(key).await?;
                    State::UpstreamFetch { record, attempt: 1 }
                }

                State::Streaming { record, upstream, attempt } => {
                    return Ok(self.relay(&record, req, upstream, attempt));
                }
            };
        }
    }

    async fn fetch(&self, record: &StreamRecord, req: &PlaybackRequest, attempt: u32) -> Result<reqwest::Response> {
        let method = if req.is_head() { Method::HEAD } else { Method::GET };
        let mut builder = self.client.request(method, &record.url);

        for (name, value) in &record.http_headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => tracing::debug!(header = %name, "skipping invalid upstream header"),
            }
        }
        if let Some(range) = byte_range(record, req) {
            builder = builder.header(header::RANGE, range.to_string());
        }
        for (name, value) in &req.conditionals {
            builder = builder.header(name, value);
        }

        let range = byte_range(record, req).map(|r| r.to_string()).unwrap_or_else(|| "-".into());
        tracing::debug!(video_id = %req.key.video_id, attempt, range = %range, "fetching upstream");

        match tokio::time::timeout(self.response_timeout, builder.send()).await {
            Err(_) => Err(Error::Timeout(format!(
                "media host did not answer within {}s",
                self.response_timeout.as_secs()
            ))),
            Ok(Err(e)) if e.is_timeout() => Err(Error::Timeout(format!("media host: {e}"))),
            Ok(Err(e)) => Err(Error::upstream(format!("media host: {e}"))),
            Ok(Ok(resp)) => Ok(resp),
        }
    }

    fn relay(&self, record: &StreamRecord, req: &PlaybackRequest, upstream: reqwest::Response, attempt: u32) -> Response {
        let status = upstream.status();
        let mut headers = HeaderMap::new();
        for name in RELAYED_HEADERS {
            if let Some(value) = upstream.headers().get(&name) {
                headers.insert(name, value.clone());
            }
        }
        let mime = HeaderValue::from_static(record.container.mime_type());
        if is_manifest(record) {
            headers.insert(header::CONTENT_TYPE, mime);
            headers.remove(header::ACCEPT_RANGES);
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(MANIFEST_CACHE_CONTROL));
        } else {
            if !headers.contains_key(header::CONTENT_TYPE) {
                headers.insert(header::CONTENT_TYPE, mime);
            }
            if !headers.contains_key(header::ACCEPT_RANGES) {
                headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            }
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }

        if let Some((start, end, total)) = headers
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
        {
            tracing::debug!(video_id = %record.video_id, start, end, total, "relaying partial content");
        }

        if req.debug {
            insert_debug_headers(&mut headers, record, "proxy");
            headers.insert(X_ATTEMPT.clone(), HeaderValue::from(attempt + 1));
        }

        let body = if req.is_head() {
            Body::empty()
        } else {
            relay_body(upstream, self.idle_timeout, record.video_id.clone())
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Stream the upstream body chunk by chunk, failing the body when no chunk
/// arrives within `idle`. Dropping the body drops the upstream connection.
fn relay_body(upstream: reqwest::Response, idle: Duration, video_id: String) -> Body {
    let mut chunks = Box::pin(upstream.bytes_stream());
    let stream = async_stream::stream! {
        loop {
            match tokio::time::timeout(idle, chunks.next()).await {
                Ok(Some(Ok(bytes))) => yield Ok::<Bytes, io::Error>(bytes),
                Ok(Some(Err(e))) => {
                    tracing::warn!(video_id = %video_id, error = %e, "upstream body failed");
                    yield Err(io::Error::other(e));
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(video_id = %video_id, idle_secs = idle.as_secs(), "upstream body stalled");
                    yield Err(io::Error::new(io::ErrorKind::TimedOut, "upstream idle timeout"));
                    break;
                }
            }
        }
    };
    Body::from_stream(stream)
}

fn is_manifest(record: &StreamRecord) -> bool {
    record.container == Container::Hls
}

/// The client's range, unless the record is a manifest.
fn byte_range(record: &StreamRecord, req: &PlaybackRequest) -> Option<ByteRange> {
    req.range.filter(|_| !is_manifest(record))
}

/// A 416 answered locally when the record already knows the length.
fn unsatisfiable_range(record: &StreamRecord, req: &PlaybackRequest) -> Option<Response> {
    let range = byte_range(record, req)?;
    let total = record.content_length?;
    if range.resolve(total).is_some() {
        return None;
    }
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total}")) {
        headers.insert(header::CONTENT_RANGE, value);
    }
    Some(response)
}

fn redirect_response(record: &StreamRecord, req: &PlaybackRequest) -> Result<Response> {
    let location = HeaderValue::from_str(&record.url)
        .map_err(|_| Error::Internal(format!("resolved url for {} is not a valid header", record.video_id)))?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if req.debug {
        insert_debug_headers(headers, record, "redirect");
    }
    Ok(response)
}

fn insert_debug_headers(headers: &mut HeaderMap, record: &StreamRecord, mode: &'static str) {
    headers.insert(X_MODE.clone(), HeaderValue::from_static(mode));
    let kind = if is_manifest(record) { "hls" } else { "media" };
    headers.insert(X_KIND.clone(), HeaderValue::from_static(kind));
    if let Some(format_id) = record.format_id.as_deref().and_then(|f| HeaderValue::from_str(f).ok()) {
        headers.insert(X_FORMAT.clone(), format_id);
    }
    if let Ok(container) = HeaderValue::from_str(&record.container.to_string()) {
        headers.insert(X_CONTAINER.clone(), container);
    }
}

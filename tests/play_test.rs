//! Integration tests for `/play` and `/hls`: ranges, expiry retry, HEAD, itags, manifests and redirect.

mod common;

use common::{client, media_bytes, HarnessOptions, TestHarness, MANIFEST, MEDIA_LEN};
use wiremock::matchers::{path, path_regex};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn range_request_is_partial_content() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/play/abc"))
        .header("range", "bytes=100-199")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 100-199/1000");
    assert_eq!(resp.headers()["accept-ranges"], "bytes");
    assert_eq!(resp.headers()["content-type"], "video/mp4");
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.len(), 100);
    assert_eq!(&body[..], &media_bytes()[100..200]);
}

#[tokio::test]
async fn no_range_is_full_body() {
    let (h, addr) = TestHarness::with_server().await;

    let resp = client().get(format!("http://{addr}/play/abc")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["accept-ranges"], "bytes");
    assert_eq!(resp.headers()["etag"], "\"media-v1\"");
    assert_eq!(resp.headers()["cache-control"], "no-store");
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.len(), MEDIA_LEN);
    assert_eq!(h.media_hits("abc", 1).await, 1);
}

#[tokio::test]
async fn suffix_and_open_ranges() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/play/abc"))
        .header("range", "bytes=-10")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 990-999/1000");

    let resp = client()
        .get(format!("http://{addr}/play/abc"))
        .header("range", "bytes=900-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.bytes().await.unwrap().len(), 100);
}

#[tokio::test]
async fn multi_range_serves_full_resource() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/play/abc"))
        .header("range", "bytes=0-9,20-29")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().len(), MEDIA_LEN);
}

#[tokio::test]
async fn unsatisfiable_range_is_416() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/play/abc"))
        .header("range", "bytes=5000-6000")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 416);
    assert_eq!(resp.headers()["content-range"], "bytes */1000");
}

#[tokio::test]
async fn expired_link_is_re_resolved_once() {
    let h = TestHarness::new().await;
    Mock::given(path("/media/abc/1"))
        .respond_with(ResponseTemplate::new(403))
        .with_priority(1)
        .mount(&h.media)
        .await;
    let (h, addr) = h.serve().await;

    let resp = client().get(format!("http://{addr}/play/abc")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().len(), MEDIA_LEN);
    assert_eq!(h.resolver.calls(), 2);
    assert_eq!(h.media_hits("abc", 1).await, 1);
    assert_eq!(h.media_hits("abc", 2).await, 1);

    // The refreshed link is cached for the next request.
    let resp = client().get(format!("http://{addr}/play/abc")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(h.resolver.calls(), 2);
}

#[tokio::test]
async fn second_rejection_is_exhausted() {
    let h = TestHarness::new().await;
    Mock::given(path_regex("^/media/abc/"))
        .respond_with(ResponseTemplate::new(410))
        .with_priority(1)
        .mount(&h.media)
        .await;
    let (h, addr) = h.serve().await;

    let resp = client().get(format!("http://{addr}/play/abc")).send().await.unwrap();

    assert_eq!(resp.status(), 502);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "expired_link_exhausted");
    assert_eq!(h.resolver.calls(), 2);
    assert_eq!(h.media_hits("abc", 1).await, 1);
    assert_eq!(h.media_hits("abc", 2).await, 1);
}

#[tokio::test]
async fn resolver_errors_map_to_status() {
    let (h, addr) = TestHarness::with_server().await;

    let resp = client().get(format!("http://{addr}/play/unknown123")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "not_found");
    assert_eq!(h.resolver.calls(), 1);

    let resp = client()
        .get(format!("http://{addr}/play/abc?policy=nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "invalid_policy");
}

#[tokio::test]
async fn head_is_forwarded_as_head() {
    let (h, addr) = TestHarness::with_server().await;

    let resp = client().head(format!("http://{addr}/play/abc")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["accept-ranges"], "bytes");

    let requests = h.media.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method.as_str(), "HEAD");
}

#[tokio::test]
async fn tool_headers_are_replayed_upstream() {
    let (h, addr) = TestHarness::with_server().await;

    client().get(format!("http://{addr}/play/abc")).send().await.unwrap();

    let requests = h.media.received_requests().await.unwrap();
    assert_eq!(requests[0].headers["user-agent"], "ytbridge-tests");
}

#[tokio::test]
async fn redirect_query_answers_302() {
    let (h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/play/abc?redirect=1&debug=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers()["location"].to_str().unwrap(),
        format!("{}/media/abc/1", h.media.uri())
    );
    assert_eq!(resp.headers()["x-ytbridge-mode"], "redirect");
    assert!(h.media.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn redirect_mode_from_config() {
    let mut opts = HarnessOptions::default();
    opts.config.playback.mode = "redirect".into();
    let (_h, addr) = TestHarness::with_server_options(opts).await;

    let resp = client().get(format!("http://{addr}/play/abc")).send().await.unwrap();
    assert_eq!(resp.status(), 302);

    let resp = client()
        .get(format!("http://{addr}/play/abc?redirect=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn debug_headers_in_proxy_mode() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/play/abc?debug=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-ytbridge-mode"], "proxy");
    assert_eq!(resp.headers()["x-ytbridge-format"], "18");
    assert_eq!(resp.headers()["x-ytbridge-container"], "mp4");
    assert_eq!(resp.headers()["x-ytbridge-attempt"], "1");
}

#[tokio::test]
async fn itag_plays_that_format_under_its_own_key() {
    let (h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/play/abc?itag=22&debug=1"))
        .header("range", "bytes=0-9")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["x-ytbridge-format"], "22");
    assert_eq!(resp.bytes().await.unwrap().len(), 10);

    // The policy and the itag are cached separately; repeats hit the cache.
    client().get(format!("http://{addr}/play/abc")).send().await.unwrap();
    client().get(format!("http://{addr}/play/abc?itag=22")).send().await.unwrap();
    assert_eq!(h.resolver.calls(), 2);
    assert_eq!(h.ctx.cache().len(), 2);
}

#[tokio::test]
async fn unknown_itag_is_404() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = client().get(format!("http://{addr}/play/abc?itag=999")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "not_found");

    let resp = client()
        .get(format!("http://{addr}/play/abc?itag=..%2F18"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn hls_manifest_is_passed_through() {
    let (h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/hls/abc?debug=1"))
        .header("range", "bytes=0-9")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/vnd.apple.mpegurl");
    assert_eq!(resp.headers()["cache-control"], "private, max-age=30");
    assert_eq!(resp.headers()["x-ytbridge-kind"], "hls");
    assert_eq!(resp.headers()["x-ytbridge-format"], "94");
    assert_eq!(resp.text().await.unwrap(), MANIFEST);

    let requests = h.media.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/hls/abc/1/index.m3u8");
    assert!(requests[0].headers.get("range").is_none());
}

#[tokio::test]
async fn hls_redirect_points_at_manifest() {
    let (h, addr) = TestHarness::with_server().await;

    let resp = client()
        .get(format!("http://{addr}/hls/abc?itag=95&redirect=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers()["location"].to_str().unwrap(),
        format!("{}/hls/abc/1/index.m3u8", h.media.uri())
    );
}

//! Integration tests for `/healthz` and `/item`.

mod common;

use common::{HarnessOptions, TestHarness};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn healthz_reports_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let cookies = dir.path().join("cookies.txt");
    std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();

    let mut opts = HarnessOptions::default();
    opts.config.resolver.cookies_file = Some(cookies);
    let (_h, addr) = TestHarness::with_server_options(opts).await;

    let resp = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["resolver"]["mode"], "local");
    assert_eq!(json["playback"]["mode"], "proxy");
    assert_eq!(json["playback"]["default_policy"], "h264_mp4");
    assert_eq!(json["cookies"]["present"], true);
    assert_eq!(json["cookies"]["bytes"], 28);
    assert_eq!(json["cache"]["entries"], 0);
}

#[tokio::test]
async fn healthz_counts_cache_entries() {
    let (_h, addr) = TestHarness::with_server().await;

    reqwest::get(format!("http://{addr}/resolve?video_id=abc")).await.unwrap();
    let json: serde_json::Value = reqwest::get(format!("http://{addr}/healthz"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["cache"]["entries"], 1);
    assert_eq!(json["cache"]["in_flight"], 0);
}

async fn catalog() -> MockServer {
    let server = MockServer::start().await;
    for id in ["abc", "unknown123"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/videos/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "videoId": id,
                "title": "Catalog title",
                "description": "From the catalog",
                "lengthSeconds": 40,
            })))
            .mount(&server)
            .await;
    }
    server
}

#[tokio::test]
async fn item_is_enriched_from_resolver() {
    let catalog = catalog().await;
    let mut opts = HarnessOptions::default();
    opts.config.catalog.provider = "invidious".into();
    opts.config.catalog.base_url = catalog.uri();
    let (h, addr) = TestHarness::with_server_options(opts).await;

    let resp = reqwest::get(format!("http://{addr}/item/abc")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["title"], "Catalog title");
    assert_eq!(json["description"], "From the catalog");
    assert_eq!(json["duration"], 42.0);
    assert!(json["chapters"].is_array());
    assert!(json.get("_resolver_error").is_none());

    // The enrichment warmed the cache for playback.
    assert_eq!(h.ctx.cache().len(), 1);
}

#[tokio::test]
async fn item_reports_resolver_failure_inline() {
    let catalog = catalog().await;
    let mut opts = HarnessOptions::default();
    opts.config.catalog.provider = "invidious".into();
    opts.config.catalog.base_url = catalog.uri();
    let (_h, addr) = TestHarness::with_server_options(opts).await;

    let resp = reqwest::get(format!("http://{addr}/item/unknown123")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["title"], "Catalog title");
    assert_eq!(json["duration"], 40.0);
    assert_eq!(json["_resolver_error"]["code"], "not_found");
}

#[tokio::test]
async fn item_missing_from_catalog_is_404() {
    let catalog = MockServer::start().await;
    let mut opts = HarnessOptions::default();
    opts.config.catalog.provider = "piped".into();
    opts.config.catalog.base_url = catalog.uri();
    let (_h, addr) = TestHarness::with_server_options(opts).await;

    let resp = reqwest::get(format!("http://{addr}/item/abc")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "not_found");
}

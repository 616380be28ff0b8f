//! Liveness and diagnostics.
//!
//! `/healthz` never touches the resolver or the network, so it answers even
//! while every resolution is failing.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub resolver: ResolverHealth,
    pub catalog: CatalogHealth,
    pub playback: PlaybackHealth,
    pub cookies: CookieHealth,
    pub cache: CacheHealth,
}

#[derive(Debug, Serialize)]
pub struct ResolverHealth {
    pub mode: String,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    pub net: String,
    pub sponsorblock: bool,
}

#[derive(Debug, Serialize)]
pub struct CatalogHealth {
    pub provider: &'static str,
    pub base_url: String,
}

#[derive(Debug, Serialize)]
pub struct PlaybackHealth {
    pub mode: &'static str,
    pub default_policy: String,
}

#[derive(Debug, Serialize)]
pub struct CookieHealth {
    pub configured: bool,
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub entries: usize,
    pub in_flight: usize,
}

/// GET /healthz
pub async fn healthz(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let cfg = &ctx.config;

    let cookies = match &cfg.resolver.cookies_file {
        Some(path) => match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => CookieHealth {
                configured: true,
                present: true,
                bytes: Some(meta.len()),
            },
            _ => CookieHealth {
                configured: true,
                present: false,
                bytes: None,
            },
        },
        None => CookieHealth {
            configured: false,
            present: false,
            bytes: None,
        },
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        resolver: ResolverHealth {
            mode: cfg.resolver.mode.clone(),
            tool: cfg.resolver.tool_path.display().to_string(),
            remote_url: cfg.resolver.remote_url.clone(),
            net: cfg.resolver.net.clone(),
            sponsorblock: cfg.resolver.sponsorblock,
        },
        catalog: CatalogHealth {
            provider: ctx.catalog.provider().as_str(),
            base_url: cfg.catalog.base_url.clone(),
        },
        playback: PlaybackHealth {
            mode: if ctx.proxy.redirects() { "redirect" } else { "proxy" },
            default_policy: cfg.playback.default_policy().to_string(),
        },
        cookies,
        cache: CacheHealth {
            entries: ctx.cache().len(),
            in_flight: ctx.coordinator.in_flight(),
        },
    })
}

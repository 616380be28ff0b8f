//! GET|HEAD /hls/{video_id}: an HLS manifest, relayed or redirected.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use axum::Extension;
use serde::Deserialize;
use yb_core::Selector;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::proxy::PlaybackRequest;
use crate::routes::{flag, tagged};

#[derive(Debug, Deserialize)]
pub struct HlsQuery {
    /// Preferred manifest itag; 94 when absent.
    pub itag: Option<String>,
    pub redirect: Option<String>,
    pub debug: Option<String>,
}

pub async fn hls(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(video_id): Path<String>,
    Query(query): Query<HlsQuery>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tag = tagged(&request_id);

    let selector = Selector::hls(query.itag.as_deref()).map_err(&tag)?;
    let req = PlaybackRequest::new(&video_id, selector, method, &headers)
        .map_err(&tag)?
        .with_redirect(flag(query.redirect.as_deref()))
        .with_debug(flag(query.debug.as_deref()).unwrap_or(false));

    ctx.proxy.serve(&ctx.coordinator, &req).await.map_err(&tag)
}

//! GET|HEAD /play/{video_id}: media bytes through the playback proxy.
//!
//! `?itag=` picks one exact format and takes precedence over `?policy=`.

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
pub struct PlayQuery {
    pub policy: Option<String>,
    pub itag: Option<String>,
    pub redirect: Option<String>,
    pub debug: Option<String>,
}

pub async fn play(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(video_id): Path<String>,
    Query(query): Query<PlayQuery>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tag = tagged(&request_id);

    let selector = Selector::from_query(
        query.policy.as_deref(),
        query.itag.as_deref(),
        ctx.config.playback.default_policy(),
    )
    .map_err(&tag)?;

    let req = PlaybackRequest::new(&video_id, selector, method, &headers)
        .map_err(&tag)?
        .with_redirect(flag(query.redirect.as_deref()))
        .with_debug(flag(query.debug.as_deref()).unwrap_or(false));

    ctx.proxy.serve(&ctx.coordinator, &req).await.map_err(&tag)
}

//! GET /resolve: the resolved stream description as JSON.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yb_core::{Chapter, Codecs, Error, ResolutionKey, Selector, StreamRecord, SubtitleTrack, Thumbnail};
use yb_resolver::validate_video_id;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::routes::tagged;

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub video_id: Option<String>,
    pub policy: Option<String>,
    pub itag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub id: String,
    pub title: Option<String>,
    pub url: String,
    pub itag: Option<String>,
    pub container: String,
    pub codecs: Codecs,
    pub duration: Option<f64>,
    pub thumbnails: Vec<Thumbnail>,
    pub chapters: Vec<Chapter>,
    pub subtitles: Vec<SubtitleTrack>,
    pub expires_at: DateTime<Utc>,
}

impl From<&StreamRecord> for ResolveResponse {
    fn from(r: &StreamRecord) -> Self {
        Self {
            id: r.video_id.clone(),
            title: r.title.clone(),
            url: r.url.clone(),
            itag: r.format_id.clone(),
            container: r.container.to_string(),
            codecs: r.codecs.clone(),
            duration: r.duration,
            thumbnails: r.thumbnails.clone(),
            chapters: r.chapters.clone(),
            subtitles: r.subtitles.clone(),
            expires_at: r.expires_at,
        }
    }
}

/// GET /resolve?video_id={id}&policy={name}&itag={itag}
pub async fn resolve(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, AppError> {
    let tag = tagged(&request_id);

    let video_id = query
        .video_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| tag(Error::Validation("video_id is required".into())))?;
    validate_video_id(video_id).map_err(&tag)?;
    let selector = Selector::from_query(
        query.policy.as_deref(),
        query.itag.as_deref(),
        ctx.config.playback.default_policy(),
    )
    .map_err(&tag)?;

    let key = ResolutionKey::new(video_id, selector);
    let record = ctx.coordinator.resolve_or_join(&key).await.map_err(&tag)?;

    Ok(Json(ResolveResponse::from(record.as_ref())))
}

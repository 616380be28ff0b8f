//! GET /item/{video_id}: catalog metadata enriched from the resolver.
//!
//! The catalog object is returned with its own field names. Duration,
//! chapters, subtitles, and thumbnails from the resolved record are layered
//! on top. A failed resolution does not fail the request when the catalog
//! answered; it is reported under `_resolver_error` instead.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::{json, Map, Value};
use yb_core::{ResolutionKey, Result, StreamRecord};
use yb_resolver::validate_video_id;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::routes::tagged;

pub async fn get_item(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(video_id): Path<String>,
) -> std::result::Result<Json<Value>, AppError> {
    let tag = tagged(&request_id);
    validate_video_id(&video_id).map_err(&tag)?;

    let key = ResolutionKey::new(video_id.as_str(), ctx.config.playback.default_policy());
    let (meta, resolved) = tokio::join!(
        ctx.catalog.video(&video_id),
        ctx.coordinator.resolve_or_join(&key)
    );

    let meta = match meta.map_err(&tag)? {
        Some(meta) => meta,
        // Without a catalog the resolver is the only source.
        None => {
            let record = resolved.map_err(&tag)?;
            let mut meta = Map::new();
            meta.insert("videoId".into(), json!(video_id));
            if let Some(title) = &record.title {
                meta.insert("title".into(), json!(title));
            }
            return Ok(Json(Value::Object(enrich(meta, Ok(record)))));
        }
    };

    Ok(Json(Value::Object(enrich(meta, resolved))))
}

/// Layer resolver data over a catalog object.
pub fn enrich(mut meta: Map<String, Value>, resolved: Result<Arc<StreamRecord>>) -> Map<String, Value> {
    let catalog_length = meta.get("lengthSeconds").and_then(Value::as_f64);

    match resolved {
        Ok(record) => {
            if let Some(duration) = record.duration.or(catalog_length) {
                meta.insert("duration".into(), json!(duration));
            }
            meta.insert("chapters".into(), json!(record.chapters));
            meta.insert("subtitles".into(), json!(record.subtitles));
            if !record.thumbnails.is_empty() {
                meta.insert("thumbnails".into(), json!(record.thumbnails));
            }
        }
        Err(e) => {
            tracing::debug!(code = e.code(), error = %e, "item enrichment failed");
            if let Some(duration) = catalog_length {
                meta.insert("duration".into(), json!(duration));
            }
            meta.insert(
                "_resolver_error".into(),
                json!({ "code": e.code(), "error": e.to_string() }),
            );
        }
    }
    meta
}

//! GET /formats/{video_id}: every format the tool reports, normalized.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use yb_resolver::{validate_video_id, FormatListing};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::routes::tagged;

pub async fn list_formats(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(video_id): Path<String>,
) -> Result<Json<FormatListing>, AppError> {
    let tag = tagged(&request_id);
    validate_video_id(&video_id).map_err(&tag)?;

    let listing = ctx
        .coordinator
        .resolver()
        .list_formats(&video_id)
        .await
        .map_err(&tag)?;
    Ok(Json(listing))
}

//! Axum router construction.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/resolve", get(routes::resolve::resolve))
        .route(
            "/play/{video_id}",
            get(routes::play::play).head(routes::play::play),
        )
        .route("/hls/{video_id}", get(routes::hls::hls).head(routes::hls::hls))
        .route("/formats/{video_id}", get(routes::formats::list_formats))
        .route("/item/{video_id}", get(routes::item::get_item))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

//! Axum router configuration

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{
    download_video, generate_captioned_video, health_check, metrics_handler, root_info,
    version_check,
};

/// Room for multipart boundaries and the small text fields
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config
        .storage
        .max_upload_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let router = Router::new()
        .route("/", get(root_info))
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        .route("/metrics", get(metrics_handler))
        .route("/generate-captioned-video", post(generate_captioned_video))
        .route("/download/{filename}", get(download_video))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    let router = if state.config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::HEAD])
            .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
            .max_age(Duration::from_secs(3600));
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}

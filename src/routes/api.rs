use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the plain HTTP router: health checks and the voice webhook.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/health", get(api::health_check))
        .route("/voice", post(api::voice_webhook))
        .layer(TraceLayer::new_for_http())
}

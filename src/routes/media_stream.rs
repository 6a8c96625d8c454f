//! Media stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::api::MEDIA_STREAM_PATH;
use crate::handlers::media_stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the telephony media stream router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for one call
///
/// The connection limit middleware should be layered on top in `main.rs`
/// after state is available.
pub fn create_media_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}

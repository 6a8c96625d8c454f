pub mod api;
pub mod media_stream;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Assemble every route with its middleware and bind the state.
pub fn create_app(state: Arc<AppState>) -> Router {
    let media_routes = media_stream::create_media_stream_router().layer(
        middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );

    api::create_api_router()
        .merge(media_routes)
        .with_state(state)
}

//! Call admission middleware for the telephony WebSocket
//!
//! Enforces `max_concurrent_calls`. Each admitted upgrade carries a
//! [`CallSlot`] in its request extensions; the slot is released when the
//! media stream handler drops it at the end of the call.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use voice_bridge::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/media-stream", get(media_stream_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// Reject WebSocket upgrades with 503 once the call limit is reached.
///
/// Requests without an `Upgrade: websocket` header pass through untouched.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.try_acquire_call() {
        Ok(slot) => {
            request.extensions_mut().insert(slot);
            next.run(request).await
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(
                active = state.active_connections(),
                limit = ?state.config.max_concurrent_calls,
                "Rejecting call: concurrent call limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
    }
}

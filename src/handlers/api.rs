use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Path the telephony provider streams call audio to.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_calls: usize,
}

/// Liveness probe reporting the number of calls in the registry.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        active_calls: state.active_calls(),
    })
}

/// Voice webhook: tell the telephony provider to open a media stream back to us.
///
/// The stream URL is built from the request's `Host` header, so the bridge can
/// sit behind any public hostname without extra configuration.
pub async fn voice_webhook(headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing Host header".to_string()))?;

    tracing::info!(host = %host, "Incoming call, returning media stream TwiML");

    Ok((
        [(header::CONTENT_TYPE, "text/xml")],
        stream_twiml(host),
    ))
}

fn stream_twiml(host: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Connect><Stream url="wss://{}{MEDIA_STREAM_PATH}"/></Connect></Response>"#,
        escape_attr(host)
    )
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

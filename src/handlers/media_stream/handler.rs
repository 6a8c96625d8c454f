use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt, future};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{debug, error, info, warn};

use crate::core::telephony::{InboundMessage, OutboundMessage, StreamStart, TELEPHONY_ENCODING};
use crate::state::{AppState, CallSlot};

/// Outbound frames buffered per call
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How long to wait for the `start` envelope after the upgrade
const START_TIMEOUT: Duration = Duration::from_secs(10);

/// Media stream WebSocket handler
///
/// Upgrades the connection and runs one call over it. The call slot granted
/// by the connection limit middleware is held until the call ends.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<CallSlot>>,
) -> Response {
    debug!("Media stream upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            let _slot = slot;
            handle_media_stream(socket, state).await;
        })
}

async fn handle_media_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let start = match timeout(START_TIMEOUT, await_start(&mut receiver)).await {
        Ok(Some(start)) => start,
        Ok(None) => {
            info!("Media stream closed before start");
            return;
        }
        Err(_) => {
            warn!(
                timeout_secs = START_TIMEOUT.as_secs(),
                "No start event received, closing media stream"
            );
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    if let Some(format) = &start.media_format
        && format.encoding != TELEPHONY_ENCODING
    {
        warn!(
            call_id = %start.call_sid,
            encoding = %format.encoding,
            "Unexpected media encoding, treating audio as μ-law"
        );
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing envelopes; closes the socket once the call drops its sender
    let sender_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize outbound envelope: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json.into())).await {
                debug!("Telephony socket closed while sending: {}", e);
                return;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let inbound = Box::pin(
        receiver
            .take_while(|msg| {
                let open = match msg {
                    Ok(Message::Close(_)) => false,
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Telephony WebSocket error: {}", e);
                        false
                    }
                };
                future::ready(open)
            })
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => parse_envelope(text.as_str()),
                    _ => None,
                })
            }),
    );

    match state
        .orchestrator()
        .run_call(&start, inbound, outbound_tx)
        .await
    {
        Ok(outcome) => debug!(
            call_id = %outcome.call_id,
            end_reason = %outcome.end_reason,
            "Media stream finished"
        ),
        Err(e) => error!(call_id = %start.call_sid, error = %e, "Call failed"),
    }

    if let Err(e) = sender_task.await {
        warn!("Media stream sender task failed: {}", e);
    }
}

/// Read envelopes until `start`. Returns `None` if the stream ends first.
async fn await_start(receiver: &mut SplitStream<WebSocket>) -> Option<StreamStart> {
    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                warn!("Telephony WebSocket error before start: {}", e);
                return None;
            }
        };

        match parse_envelope(text.as_str()) {
            Some(InboundMessage::Start { start, .. }) => return Some(start),
            Some(InboundMessage::Stop { .. }) => return None,
            Some(InboundMessage::Connected { protocol, .. }) => {
                debug!(protocol = ?protocol, "Media stream connected");
            }
            Some(other) => debug!(event = other.event_name(), "Ignoring event before start"),
            None => {}
        }
    }
    None
}

/// Parse one text frame. Malformed JSON is logged and dropped.
fn parse_envelope(text: &str) -> Option<InboundMessage> {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, "Dropping malformed telephony envelope");
            None
        }
    }
}

//! WebSocket mock of the OpenAI Realtime API
//!
//! Speaks just enough of the protocol for the bridge: `session.created` on
//! connect, a scripted transcription after the first audio append, and one
//! audio delta per `response.create`. Every client event is recorded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// How the mock answers a new connection.
#[derive(Clone, Debug)]
pub enum RealtimeBehavior {
    /// Normal session; emits `transcript` after the first audio append
    Conversational { transcript: Option<String> },
    /// Accept the socket but never send `session.created`
    Silent,
    /// Send an `error` event instead of `session.created`
    RejectSession,
}

/// PCM16 the mock returns for every `response.create`: four samples of silence.
pub const MOCK_AUDIO_PCM: [u8; 8] = [0; 8];

pub struct RealtimeMockServer {
    pub url: String,
    pub connections: Arc<AtomicU64>,
    received: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

impl RealtimeMockServer {
    pub async fn start(behavior: RealtimeBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicU64::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let connections = connections.clone();
            let received = received.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let behavior = behavior.clone();
                    let received = received.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, behavior, received).await {
                            eprintln!("Realtime mock connection error: {}", e);
                        }
                    });
                }
            })
        };

        Self {
            url: format!("ws://{addr}/v1/realtime"),
            connections,
            received,
            handle,
        }
    }

    /// Every client event received so far, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    pub fn received_of_type(&self, event_type: &str) -> Vec<Value> {
        self.received
            .lock()
            .iter()
            .filter(|e| e["type"] == event_type)
            .cloned()
            .collect()
    }

    /// Poll until at least `count` events of `event_type` have arrived.
    pub async fn wait_for(&self, event_type: &str, count: usize) -> Vec<Value> {
        for _ in 0..200 {
            let events = self.received_of_type(event_type);
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} {event_type} event(s)");
    }
}

impl Drop for RealtimeMockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    behavior: RealtimeBehavior,
    received: Arc<Mutex<Vec<Value>>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    let transcript = match behavior {
        RealtimeBehavior::Silent => {
            // Hold the socket open without answering
            while let Some(Ok(_)) = read.next().await {}
            return Ok(());
        }
        RealtimeBehavior::RejectSession => {
            let error = json!({
                "type": "error",
                "error": {
                    "type": "invalid_request_error",
                    "code": "invalid_api_key",
                    "message": "Incorrect API key provided"
                }
            });
            write.send(Message::Text(error.to_string().into())).await?;
            return Ok(());
        }
        RealtimeBehavior::Conversational { transcript } => transcript,
    };

    let created = json!({
        "type": "session.created",
        "event_id": "evt_1",
        "session": {"id": "sess_mock", "model": "gpt-4o-realtime-preview", "voice": "alloy"}
    });
    write.send(Message::Text(created.to_string().into())).await?;

    let mut transcript = transcript;
    let mut responses = 0u32;

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let event: Value = serde_json::from_str(&text)?;
                received.lock().push(event.clone());

                match event["type"].as_str() {
                    Some("session.update") => {
                        let updated = json!({
                            "type": "session.updated",
                            "session": {"id": "sess_mock"}
                        });
                        write.send(Message::Text(updated.to_string().into())).await?;
                    }
                    Some("input_audio_buffer.append") => {
                        if let Some(text) = transcript.take() {
                            let done = json!({
                                "type": "conversation.item.input_audio_transcription.completed",
                                "item_id": "item_1",
                                "content_index": 0,
                                "transcript": text
                            });
                            write.send(Message::Text(done.to_string().into())).await?;
                        }
                    }
                    Some("response.create") => {
                        responses += 1;
                        let response_id = format!("resp_{responses}");
                        let delta = json!({
                            "type": "response.audio.delta",
                            "response_id": response_id,
                            "item_id": "item_out",
                            "output_index": 0,
                            "content_index": 0,
                            "delta": BASE64.encode(MOCK_AUDIO_PCM)
                        });
                        write.send(Message::Text(delta.to_string().into())).await?;
                        let done = json!({
                            "type": "response.done",
                            "response": {"id": response_id, "status": "completed"}
                        });
                        write.send(Message::Text(done.to_string().into())).await?;
                    }
                    _ => {}
                }
            }
            Ok(Message::Ping(data)) => write.send(Message::Pong(data)).await?,
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    Ok(())
}

//! OpenAI Realtime API speech channel.
//!
//! Each [`OpenAIRealtime`] owns one WebSocket connection. Opening it runs the
//! handshake inline: connect, wait for `session.created`, then send a single
//! `session.update`. After that a spawned connection task moves queued client
//! events out to the socket and maps server events into [`SpeechEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use super::config::PCM16_FORMAT;
use super::messages::{
    ClientEvent, InputAudioTranscription, ServerEvent, SessionConfig, TurnDetection,
};
use crate::core::realtime::base::{
    RealtimeConfig, RealtimeError, RealtimeResult, SpeechChannel, SpeechConnector, SpeechEvent,
    SpeechEventStream,
};

/// Outgoing client event queue capacity.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Inbound speech event queue capacity.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `close` waits for the connection task to send its close frame.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Speech channel backed by the OpenAI Realtime API.
pub struct OpenAIRealtime {
    call_id: String,
    session_id: String,
    voice: String,
    /// Shared with the connection task
    connected: Arc<AtomicBool>,
    ws_sender: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    events_rx: Mutex<Option<mpsc::Receiver<SpeechEvent>>>,
    connection_handle: Mutex<Option<JoinHandle<()>>>,
}

impl OpenAIRealtime {
    /// Connect and run the session handshake within the configured timeout.
    pub async fn connect(call_id: &str, config: &RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required for OpenAI Realtime".to_string(),
            ));
        }

        let timeout = config.handshake_timeout();
        let (ws, session_id) = tokio::time::timeout(timeout, handshake(config))
            .await
            .map_err(|_| {
                RealtimeError::ConnectionFailed(format!(
                    "session handshake did not complete within {}ms",
                    timeout.as_millis()
                ))
            })??;

        info!(call_id = %call_id, session_id = %session_id, "Speech channel established");

        let (ws_sink, ws_stream) = ws.split();
        let (tx, rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel::<SpeechEvent>(EVENT_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));

        let handle = tokio::spawn(run_connection(
            call_id.to_string(),
            ws_sink,
            ws_stream,
            rx,
            events_tx,
            connected.clone(),
        ));

        Ok(Self {
            call_id: call_id.to_string(),
            session_id,
            voice: config.voice.as_str().to_string(),
            connected,
            ws_sender: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(events_rx)),
            connection_handle: Mutex::new(Some(handle)),
        })
    }

    /// Session id assigned by the server in `session.created`.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Send an event to the WebSocket.
    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        let sender = self
            .ws_sender
            .lock()
            .clone()
            .ok_or(RealtimeError::NotConnected)?;
        sender
            .send(event)
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }
}

#[async_trait]
impl SpeechChannel for OpenAIRealtime {
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        self.send_event(ClientEvent::audio_append(&audio)).await
    }

    fn events(&self) -> RealtimeResult<SpeechEventStream> {
        let mut rx = self
            .events_rx
            .lock()
            .take()
            .ok_or(RealtimeError::EventStreamTaken)?;
        Ok(Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }))
    }

    async fn speak(&self, text: &str) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        self.send_event(ClientEvent::speak(text, &self.voice)).await
    }

    async fn close(&self) -> RealtimeResult<()> {
        // Dropping the sender makes the connection task send a close frame.
        self.ws_sender.lock().take();

        let handle = self.connection_handle.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        info!(call_id = %self.call_id, "Speech channel closed");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for OpenAIRealtime {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_handle.get_mut().take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Opens [`OpenAIRealtime`] channels from a shared configuration.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeConnector {
    config: RealtimeConfig,
}

impl OpenAIRealtimeConnector {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }
}

#[async_trait]
impl SpeechConnector for OpenAIRealtimeConnector {
    async fn open(&self, call_id: &str) -> RealtimeResult<Arc<dyn SpeechChannel>> {
        let channel = OpenAIRealtime::connect(call_id, &self.config).await?;
        Ok(Arc::new(channel))
    }
}

// =============================================================================
// Handshake
// =============================================================================

/// Build the WebSocket URL with the model parameter.
pub(crate) fn build_ws_url(config: &RealtimeConfig) -> RealtimeResult<Url> {
    let mut url = Url::parse(&config.url)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid realtime URL: {e}")))?;
    url.query_pairs_mut().append_pair("model", &config.model);
    Ok(url)
}

/// Build the one `session.update` sent after `session.created`.
pub(crate) fn build_session_config(config: &RealtimeConfig) -> SessionConfig {
    SessionConfig {
        modalities: Some(vec!["text".to_string(), "audio".to_string()]),
        instructions: Some(config.instructions.clone()),
        voice: Some(config.voice.as_str().to_string()),
        input_audio_format: Some(PCM16_FORMAT.to_string()),
        output_audio_format: Some(PCM16_FORMAT.to_string()),
        input_audio_transcription: Some(InputAudioTranscription {
            model: config.transcription_model.clone(),
        }),
        turn_detection: Some(TurnDetection::ServerVad {
            threshold: Some(config.vad.threshold),
            prefix_padding_ms: Some(config.vad.prefix_padding_ms),
            silence_duration_ms: Some(config.vad.silence_duration_ms),
            create_response: Some(false),
            interrupt_response: None,
        }),
        tools: Some(Vec::new()),
    }
}

/// Connect, wait for `session.created` and send the `session.update`.
/// Returns the socket and session id.
async fn handshake(config: &RealtimeConfig) -> RealtimeResult<(WsStream, String)> {
    let url = build_ws_url(config)?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(RealtimeError::InvalidConfiguration(
                "realtime URL has no host".to_string(),
            ));
        }
    };

    let request = http::Request::builder()
        .uri(url.as_str())
        .header("Authorization", format!("Bearer {}", config.api_key))
        .header("OpenAI-Beta", "realtime=v1")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .header("Sec-WebSocket-Version", "13")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Host", host)
        .body(())
        .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

    let (mut ws, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

    debug!("WebSocket connected, waiting for session.created");

    while let Some(msg) = ws.next().await {
        match msg.map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))? {
            Message::Text(text) => match serde_json::from_str::<ServerEvent>(&text) {
                Ok(ServerEvent::SessionCreated { session }) => {
                    send_session_update(&mut ws, config).await?;
                    return Ok((ws, session.id));
                }
                Ok(ServerEvent::Error { error }) => {
                    return Err(RealtimeError::ConnectionFailed(format!(
                        "{}: {}",
                        error.error_type, error.message
                    )));
                }
                Ok(other) => debug!("Ignoring event during handshake: {:?}", other),
                Err(e) => warn!("Failed to parse server event during handshake: {}", e),
            },
            Message::Ping(data) => {
                ws.send(Message::Pong(data))
                    .await
                    .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Err(RealtimeError::ConnectionFailed(
        "connection closed before session.created".to_string(),
    ))
}

async fn send_session_update(ws: &mut WsStream, config: &RealtimeConfig) -> RealtimeResult<()> {
    let update = ClientEvent::SessionUpdate {
        session: build_session_config(config),
    };
    let json = serde_json::to_string(&update)
        .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
    ws.send(Message::Text(json.into()))
        .await
        .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))
}

// =============================================================================
// Connection Task
// =============================================================================

/// Map a server event to a speech event, `None` for events the bridge ignores.
pub(crate) fn map_server_event(event: ServerEvent) -> Option<SpeechEvent> {
    match event {
        ServerEvent::AudioDelta { delta, .. } => match ServerEvent::decode_audio_delta(&delta) {
            Ok(bytes) => Some(SpeechEvent::AudioDelta {
                bytes: Bytes::from(bytes),
            }),
            Err(e) => {
                warn!("Dropping undecodable audio delta: {}", e);
                None
            }
        },
        ServerEvent::TranscriptionCompleted { transcript, .. } => {
            Some(SpeechEvent::TranscriptionComplete { text: transcript })
        }
        ServerEvent::Error { error } => Some(SpeechEvent::Error {
            code: error.code.unwrap_or(error.error_type),
            message: error.message,
        }),
        ServerEvent::TranscriptionFailed { error, .. } => {
            warn!("Input transcription failed: {}", error.message);
            None
        }
        other => {
            debug!("Ignoring server event: {:?}", other);
            None
        }
    }
}

/// Queue a speech event for the consumer.
///
/// Audio deltas are dropped when the queue is full so the connection task
/// never stops draining outgoing client events.
async fn forward_event(call_id: &str, events_tx: &mpsc::Sender<SpeechEvent>, event: SpeechEvent) {
    match event {
        SpeechEvent::AudioDelta { .. } => match events_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                warn!(call_id = %call_id, "Speech event queue full, dropping audio delta");
            }
        },
        other => {
            // A dropped receiver means nobody is listening anymore.
            let _ = events_tx.send(other).await;
        }
    }
}

async fn run_connection(
    call_id: String,
    mut ws_sink: futures::stream::SplitSink<WsStream, Message>,
    mut ws_stream: futures::stream::SplitStream<WsStream>,
    mut rx: mpsc::Receiver<ClientEvent>,
    events_tx: mpsc::Sender<SpeechEvent>,
    connected: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(event) = outgoing else {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                };

                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        error!("Failed to serialize {}: {}", event.event_type(), e);
                        continue;
                    }
                };

                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    error!(call_id = %call_id, "Failed to send WebSocket message: {}", e);
                    break;
                }
            }

            incoming = ws_stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                if let Some(speech_event) = map_server_event(event) {
                                    forward_event(&call_id, &events_tx, speech_event).await;
                                }
                            }
                            Err(e) => warn!("Failed to parse server event: {} - {}", e, text),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            error!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(call_id = %call_id, "Speech WebSocket closed by server");
                        break;
                    }
                    Some(Err(e)) => {
                        error!(call_id = %call_id, "Speech WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    debug!(call_id = %call_id, "Speech connection task ended");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::openai::OpenAIRealtimeVoice;

    #[test]
    fn test_build_ws_url() {
        let config = RealtimeConfig {
            model: "gpt-4o-mini-realtime-preview".to_string(),
            ..Default::default()
        };
        let url = build_ws_url(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-mini-realtime-preview"
        );
    }

    #[test]
    fn test_build_ws_url_rejects_garbage() {
        let config = RealtimeConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_ws_url(&config),
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_session_config_disables_auto_response() {
        let config = RealtimeConfig {
            voice: OpenAIRealtimeVoice::Verse,
            ..Default::default()
        };
        let session = build_session_config(&config);
        assert_eq!(session.voice.as_deref(), Some("verse"));
        assert_eq!(session.input_audio_format.as_deref(), Some("pcm16"));
        assert_eq!(session.output_audio_format.as_deref(), Some("pcm16"));
        match session.turn_detection {
            Some(TurnDetection::ServerVad {
                create_response,
                silence_duration_ms,
                ..
            }) => {
                assert_eq!(create_response, Some(false));
                assert_eq!(silence_duration_ms, Some(500));
            }
            other => panic!("unexpected turn detection: {other:?}"),
        }
    }

    #[test]
    fn test_map_server_events() {
        let delta: ServerEvent =
            serde_json::from_str(r#"{"type":"response.audio.delta","delta":"AAEC"}"#).unwrap();
        assert_eq!(
            map_server_event(delta),
            Some(SpeechEvent::AudioDelta {
                bytes: Bytes::from_static(&[0, 1, 2])
            })
        );

        let bad: ServerEvent =
            serde_json::from_str(r#"{"type":"response.audio.delta","delta":"***"}"#).unwrap();
        assert_eq!(map_server_event(bad), None);

        let error: ServerEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"server_error","message":"boom"}}"#,
        )
        .unwrap();
        assert_eq!(
            map_server_event(error),
            Some(SpeechEvent::Error {
                code: "server_error".to_string(),
                message: "boom".to_string()
            })
        );

        let started: ServerEvent =
            serde_json::from_str(r#"{"type":"input_audio_buffer.speech_started"}"#).unwrap();
        assert_eq!(map_server_event(started), None);
    }

    #[tokio::test]
    async fn test_api_key_required() {
        let result = OpenAIRealtime::connect("CA1", &RealtimeConfig::default()).await;
        assert!(matches!(
            result,
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_full_queue_drops_audio_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let audio = || SpeechEvent::AudioDelta {
            bytes: Bytes::from_static(&[0, 0]),
        };

        forward_event("CA1", &tx, audio()).await;
        tokio::time::timeout(Duration::from_millis(100), forward_event("CA1", &tx, audio()))
            .await
            .expect("audio forwarding blocked on a full queue");

        assert_eq!(rx.recv().await, Some(audio()));
        assert!(rx.try_recv().is_err());

        let transcript = SpeechEvent::TranscriptionComplete {
            text: "hello".to_string(),
        };
        forward_event("CA1", &tx, transcript.clone()).await;
        assert_eq!(rx.recv().await, Some(transcript));
    }

    #[tokio::test]
    async fn test_handshake_includes_session_update() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let created = r#"{"type":"session.created","session":{"id":"sess_1"}}"#;
            ws.send(Message::Text(created.to_string().into()))
                .await
                .unwrap();
            ws.next().await.unwrap().unwrap()
        });

        let config = RealtimeConfig {
            api_key: "sk-test".to_string(),
            url: format!("ws://{addr}/v1/realtime"),
            ..Default::default()
        };
        let (_ws, session_id) = handshake(&config).await.unwrap();
        assert_eq!(session_id, "sess_1");

        let first = server.await.unwrap();
        let value: serde_json::Value =
            serde_json::from_str(first.to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "session.update");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_handshake() {
        let config = RealtimeConfig {
            api_key: "sk-test".to_string(),
            url: "ws://127.0.0.1:1/v1/realtime".to_string(),
            handshake_timeout_ms: 2_000,
            ..Default::default()
        };
        let result = OpenAIRealtimeConnector::new(config).open("CA1").await;
        assert!(matches!(result, Err(RealtimeError::ConnectionFailed(_))));
    }
}

//! Per-call turn orchestration.
//!
//! A call runs two loops side by side. Ingress moves telephony audio into the
//! speech channel. Egress moves synthesized audio back out to telephony and
//! turns each finalized transcription into one backend turn, spoken back
//! through the channel. Turns run inline in the egress loop, so a call never
//! has more than one turn in flight.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::outcome::{CallOutcome, EndReason};
use super::{OrchestratorError, OrchestratorResult};
use crate::core::assistant::{BackendTurnResult, ConversationBackend};
use crate::core::audio::{Transcoder, decode_base64, encode_base64};
use crate::core::realtime::{SpeechChannel, SpeechConnector, SpeechEvent, SpeechEventStream};
use crate::core::session::{CallSession, CallState, SessionRegistry};
use crate::core::telephony::{InboundMessage, OutboundMessage, StreamStart};

/// Drives calls between telephony, the speech channel and the backend.
#[derive(Clone)]
pub struct TurnOrchestrator {
    registry: Arc<SessionRegistry>,
    speech: Arc<dyn SpeechConnector>,
    backend: Arc<dyn ConversationBackend>,
    transcoder: Transcoder,
}

enum Handshake {
    Opened(crate::core::realtime::RealtimeResult<Arc<dyn SpeechChannel>>),
    Ended(EndReason),
}

impl TurnOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        speech: Arc<dyn SpeechConnector>,
        backend: Arc<dyn ConversationBackend>,
        transcoder: Transcoder,
    ) -> Self {
        Self {
            registry,
            speech,
            backend,
            transcoder,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Run one call from its `start` event until teardown.
    ///
    /// `inbound` yields the telephony envelopes that follow `start`; its end
    /// means the telephony socket closed. Outbound audio frames are written to
    /// `outbound`. The session is always removed from the registry and its
    /// backend thread released before this returns, whatever the outcome.
    pub async fn run_call<S>(
        &self,
        start: &StreamStart,
        inbound: S,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> OrchestratorResult<CallOutcome>
    where
        S: Stream<Item = InboundMessage> + Send + Unpin,
    {
        let span = info_span!(
            "call",
            call_id = %start.call_sid,
            stream_sid = %start.stream_sid
        );
        self.drive(start, inbound, outbound).instrument(span).await
    }

    async fn drive<S>(
        &self,
        start: &StreamStart,
        mut inbound: S,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> OrchestratorResult<CallOutcome>
    where
        S: Stream<Item = InboundMessage> + Send + Unpin,
    {
        let session = self.registry.create(&start.call_sid, &start.stream_sid)?;
        info!("Call started, opening speech channel");

        let handshake = tokio::select! {
            opened = self.speech.open(session.call_id()) => Handshake::Opened(opened),
            reason = wait_for_end(&mut inbound) => Handshake::Ended(reason),
        };

        let channel = match handshake {
            Handshake::Opened(Ok(channel)) => channel,
            Handshake::Opened(Err(e)) => {
                error!(error = %e, "Speech channel handshake failed");
                if let Err(e) = session.transition(CallState::Closed) {
                    warn!(error = %e, "Unexpected state at handshake failure");
                }
                self.release(&session);
                return Err(OrchestratorError::Handshake(e));
            }
            Handshake::Ended(reason) => {
                info!(end_reason = %reason, "Telephony ended during handshake");
                return Ok(self.teardown(&session, None, reason).await);
            }
        };

        if let Err(e) = session.transition(CallState::Active) {
            self.teardown(&session, Some(channel.as_ref()), EndReason::SpeechChannelClosed)
                .await;
            return Err(e.into());
        }

        let events = match channel.events() {
            Ok(events) => events,
            Err(e) => {
                self.teardown(&session, Some(channel.as_ref()), EndReason::SpeechChannelClosed)
                    .await;
                return Err(OrchestratorError::Speech(e));
            }
        };

        info!("Call active");

        let token = CancellationToken::new();
        let (ingress_end, egress_end) = tokio::join!(
            self.ingress(channel.as_ref(), inbound, &token),
            self.egress(&session, channel.as_ref(), events, &outbound, &token),
        );

        let reason = ingress_end
            .or(egress_end)
            .unwrap_or(EndReason::TelephonyDisconnect);
        Ok(self.teardown(&session, Some(channel.as_ref()), reason).await)
    }

    // =========================================================================
    // Loops
    // =========================================================================

    async fn ingress<S>(
        &self,
        channel: &dyn SpeechChannel,
        mut inbound: S,
        token: &CancellationToken,
    ) -> Option<EndReason>
    where
        S: Stream<Item = InboundMessage> + Unpin,
    {
        loop {
            let message = tokio::select! {
                _ = token.cancelled() => return None,
                message = inbound.next() => message,
            };

            match message {
                None => {
                    info!("Telephony socket closed");
                    return stop(token, EndReason::TelephonyDisconnect);
                }
                Some(InboundMessage::Stop { .. }) => {
                    info!("Telephony stream stopped");
                    return stop(token, EndReason::TelephonyStop);
                }
                Some(InboundMessage::Media { media, .. }) => {
                    let mulaw = match decode_base64(&media.payload) {
                        Ok(mulaw) => mulaw,
                        Err(e) => {
                            warn!(error = %e, "Dropping telephony frame");
                            continue;
                        }
                    };

                    let pcm = self.transcoder.narrowband_to_wideband(&mulaw);
                    if pcm.is_empty() {
                        continue;
                    }

                    if let Err(e) = channel.send_audio(Bytes::from(pcm)).await {
                        warn!(error = %e, "Speech channel rejected audio");
                        return stop(token, EndReason::SpeechChannelClosed);
                    }
                }
                Some(InboundMessage::Start { .. }) => warn!("Ignoring repeated start event"),
                Some(other) => debug!(event = other.event_name(), "Ignoring telephony event"),
            }
        }
    }

    async fn egress(
        &self,
        session: &CallSession,
        channel: &dyn SpeechChannel,
        mut events: SpeechEventStream,
        outbound: &mpsc::Sender<OutboundMessage>,
        token: &CancellationToken,
    ) -> Option<EndReason> {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => return None,
                event = events.next() => event,
            };

            match event {
                None => {
                    info!("Speech channel closed");
                    return stop(token, EndReason::SpeechChannelClosed);
                }
                Some(SpeechEvent::AudioDelta { bytes }) => {
                    let mulaw = self.transcoder.wideband_to_narrowband(&bytes);
                    if mulaw.is_empty() {
                        debug!(len = bytes.len(), "Dropping malformed audio delta");
                        continue;
                    }

                    let frame = OutboundMessage::media(session.media_stream_id(), encode_base64(&mulaw));
                    if outbound.send(frame).await.is_err() {
                        warn!("Telephony writer closed");
                        return stop(token, EndReason::OutboundClosed);
                    }
                }
                Some(SpeechEvent::TranscriptionComplete { text }) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            info!("Call ending, abandoning in-flight turn");
                            return None;
                        }
                        _ = self.take_turn(session, channel, &text) => {}
                    }
                }
                Some(SpeechEvent::Error { code, message }) => {
                    error!(code = %code, message = %message, "Speech channel error");
                    if let Err(e) = session.transition(CallState::Closing) {
                        debug!(error = %e, "Session already leaving");
                    }
                    return stop(token, EndReason::SpeechChannelError);
                }
            }
        }
    }

    /// One conversational turn: backend answer, then synthesis.
    async fn take_turn(&self, session: &CallSession, channel: &dyn SpeechChannel, text: &str) {
        let utterance = text.trim();
        if utterance.is_empty() {
            debug!("Discarding empty transcription");
            return;
        }

        info!(utterance = %utterance, "Caller utterance");

        let result = match self.backend.ensure_thread(session).await {
            Ok(thread_id) => self.backend.submit_turn(&thread_id, utterance).await,
            Err(e) => {
                warn!(error = %e, "No conversation thread, speaking fallback");
                BackendTurnResult::fallback(self.backend.fallback_text())
            }
        };

        session.record_turn(result.used_fallback);
        info!(
            succeeded = result.succeeded,
            used_fallback = result.used_fallback,
            "Speaking backend answer"
        );

        if let Err(e) = channel.speak(&result.response_text).await {
            warn!(error = %e, "Failed to request synthesis");
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    fn release(&self, session: &CallSession) {
        self.registry.remove(session.call_id());
        self.backend.release(session.call_id());
    }

    async fn teardown(
        &self,
        session: &CallSession,
        channel: Option<&dyn SpeechChannel>,
        reason: EndReason,
    ) -> CallOutcome {
        if session.state() != CallState::Closing {
            if let Err(e) = session.transition(CallState::Closing) {
                warn!(error = %e, "Unexpected state at teardown");
            }
        }

        if let Some(channel) = channel {
            if let Err(e) = channel.close().await {
                warn!(error = %e, "Failed to close speech channel");
            }
        }

        self.release(session);

        if let Err(e) = session.transition(CallState::Closed) {
            warn!(error = %e, "Unexpected state at close");
        }

        let outcome = CallOutcome {
            call_id: session.call_id().to_string(),
            end_reason: reason,
            turn_count: session.turn_count(),
            fallback_count: session.fallback_count(),
            duration: session.age(),
        };

        info!(
            end_reason = %outcome.end_reason,
            turns = outcome.turn_count,
            fallbacks = outcome.fallback_count,
            duration_ms = outcome.duration.as_millis() as u64,
            "Call ended"
        );

        outcome
    }
}

/// Cancel the sibling loop, reporting `reason` only for the first loop out.
fn stop(token: &CancellationToken, reason: EndReason) -> Option<EndReason> {
    if token.is_cancelled() {
        None
    } else {
        token.cancel();
        Some(reason)
    }
}

/// Consume telephony until it ends, used while the handshake is pending.
async fn wait_for_end<S>(inbound: &mut S) -> EndReason
where
    S: Stream<Item = InboundMessage> + Unpin,
{
    while let Some(message) = inbound.next().await {
        match message {
            InboundMessage::Stop { .. } => return EndReason::TelephonyStop,
            other => debug!(event = other.event_name(), "Dropping telephony event during handshake"),
        }
    }
    EndReason::TelephonyDisconnect
}

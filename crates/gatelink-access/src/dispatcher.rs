//! Frame dispatch: bytes in, acknowledgements out.
//!
//! A single task consumes link chunks in arrival order, splits them into
//! lines, parses each line and, for valid card reads, asks the engine for a
//! decision and sends the acknowledgement. A failure on one frame never stops
//! the loop.
//!
//! Chunks carry the generation of the link they were read from. Generations
//! only move forward: a chunk from an older link than the newest one seen is
//! dropped and does not disturb the partial frame of the current link.

use crate::engine::{AccessDecisionEngine, LogFailure};
use bytes::BytesMut;
use gatelink_core::AccessDecision;
use gatelink_link::{LinkChunk, SupervisorHandle};
use gatelink_protocol::{LineCodec, MessageKind, parse};
use gatelink_storage::{AccessLogRepository, TokenRepository};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Observable outcome of processing link input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A line was not a valid card read. No acknowledgement was sent.
    FrameRejected {
        raw: String,
        kind: MessageKind,
        error: String,
    },

    /// A card read was decided.
    Decided {
        decision: AccessDecision,
        /// Whether the acknowledgement reached the link.
        ack_sent: bool,
    },

    /// An access log write failed.
    LogFailed {
        code: Option<String>,
        error: String,
    },
}

impl From<LogFailure> for DispatchEvent {
    fn from(failure: LogFailure) -> Self {
        Self::LogFailed {
            code: failure.code,
            error: failure.error,
        }
    }
}

pub struct LinkEventDispatcher<T, L> {
    engine: AccessDecisionEngine<T, L>,
    link: SupervisorHandle,
    frames: mpsc::Receiver<LinkChunk>,
    codec: LineCodec,
    buffer: BytesMut,
    generation: Option<u64>,
    events: broadcast::Sender<DispatchEvent>,
}

impl<T, L> LinkEventDispatcher<T, L>
where
    T: TokenRepository,
    L: AccessLogRepository + 'static,
{
    pub fn new(
        engine: AccessDecisionEngine<T, L>,
        link: SupervisorHandle,
        frames: mpsc::Receiver<LinkChunk>,
        events: broadcast::Sender<DispatchEvent>,
    ) -> Self {
        Self {
            engine,
            link,
            frames,
            codec: LineCodec::new(),
            buffer: BytesMut::new(),
            generation: None,
            events,
        }
    }

    /// Process chunks until cancelled or the frame queue closes.
    ///
    /// Hands the engine back so the caller can drain its pending log writes.
    pub async fn run(mut self, cancel: CancellationToken) -> AccessDecisionEngine<T, L> {
        debug!("Link event dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                chunk = self.frames.recv() => match chunk {
                    Some(chunk) => self.on_chunk(chunk).await,
                    None => {
                        debug!("Frame queue closed");
                        break;
                    }
                },
            }
        }

        debug!(pending_logs = self.engine.pending_logs(), "Link event dispatcher stopped");
        self.engine
    }

    async fn on_chunk(&mut self, chunk: LinkChunk) {
        if let Some(current) = self.generation
            && chunk.generation < current
        {
            debug!(
                generation = chunk.generation,
                current,
                bytes = chunk.bytes.len(),
                "Ignoring data from a closed link"
            );
            return;
        }

        if self.generation != Some(chunk.generation) {
            // A partial line from a closed link must not prefix the new one.
            if !self.buffer.is_empty() {
                debug!(
                    discarded = self.buffer.len(),
                    "Dropping partial frame from previous link"
                );
            }
            self.buffer.clear();
            self.codec = LineCodec::with_max_length(self.codec.max_length());
            self.generation = Some(chunk.generation);
        }

        self.buffer.extend_from_slice(&chunk.bytes);

        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(line)) => self.handle_frame(&line).await,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Discarding oversized frame");
                    self.publish(DispatchEvent::FrameRejected {
                        raw: String::new(),
                        kind: MessageKind::Unknown,
                        error: e.to_string(),
                    });
                }
            }
        }

        for failure in self.engine.reap() {
            self.publish(failure.into());
        }
    }

    async fn handle_frame(&mut self, raw: &str) {
        let message = parse(raw);

        let Some(code) = message.rfid_code() else {
            let error = message.error.clone().unwrap_or_default();
            warn!(kind = %message.kind, raw = %raw, error = %error, "Ignoring invalid frame");
            self.publish(DispatchEvent::FrameRejected {
                raw: raw.to_string(),
                kind: message.kind,
                error,
            });
            return;
        };

        let decision = self.engine.decide(code).await;
        let ack = decision.ack();

        let ack_sent = match self.link.send(ack).await {
            Ok(()) => true,
            Err(e) => {
                debug!(code = %code, error = %e, "Acknowledgement not delivered");
                false
            }
        };

        match decision.denied_reason {
            None => info!(
                code = %decision.code,
                owner = decision.owner_name.as_deref().unwrap_or("-"),
                ack = %ack,
                "Access granted"
            ),
            Some(reason) => info!(
                code = %decision.code,
                reason = %reason,
                ack = %ack,
                "Access denied"
            ),
        }

        self.publish(DispatchEvent::Decided { decision, ack_sent });
    }

    fn publish(&self, event: DispatchEvent) {
        // No subscribers is normal.
        let _ = self.events.send(event);
    }
}

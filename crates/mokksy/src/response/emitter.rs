//! Streaming emitter: turns a [`StreamSpec`] into timed body frames.
//!
//! State machine:
//!
//! ```text
//! Idle -> Starting (lead-in delay) -> Emitting(0) -> [delay -> Emitting(i + 1)]*
//!      -> Closing (terminal sentinel) -> Done
//! ```
//!
//! Every delay and every write races against closure of the body channel,
//! so a disconnected client stops emission without further writes. A failing
//! chunk source ends the body with an error frame; frames already sent stay
//! delivered.

use super::body::{ChannelBody, FrameResult};
use super::stream::{ChunkSource, SseEvent, StreamSpec};
use crate::error::StreamError;
use crate::metrics;
use bytes::Bytes;
use futures::StreamExt;
use hyper::body::Frame;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    Idle,
    Starting,
    Emitting(usize),
    Closing,
    Done,
}

/// How a stream ended, with the number of chunks written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmissionOutcome {
    Completed { chunks: usize },
    Cancelled { chunks: usize },
    Failed { chunks: usize, error: StreamError },
}

impl EmissionOutcome {
    pub fn chunks(&self) -> usize {
        match self {
            EmissionOutcome::Completed { chunks }
            | EmissionOutcome::Cancelled { chunks }
            | EmissionOutcome::Failed { chunks, .. } => *chunks,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            EmissionOutcome::Completed { .. } => "completed",
            EmissionOutcome::Cancelled { .. } => "cancelled",
            EmissionOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for EmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} chunk(s)", self.label(), self.chunks())
    }
}

pub struct StreamingEmitter {
    spec: StreamSpec,
    lead_in: Duration,
    state: EmitterState,
    emitted: usize,
}

impl StreamingEmitter {
    pub fn new(spec: StreamSpec, lead_in: Duration) -> Self {
        Self {
            spec,
            lead_in,
            state: EmitterState::Idle,
            emitted: 0,
        }
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    fn transition(&mut self, next: EmitterState) {
        trace!("Stream emitter {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Spawn emission onto the runtime and return the body it feeds.
    pub fn spawn(self, label: String) -> ChannelBody {
        let (tx, body) = ChannelBody::channel(1);
        tokio::spawn(async move {
            let outcome = self.run(tx).await;
            debug!("Stream for {} {}", label, outcome);
        });
        body
    }

    /// Drive the state machine to completion, writing frames to `tx`.
    pub async fn run(mut self, tx: mpsc::Sender<FrameResult>) -> EmissionOutcome {
        let outcome = self.emit(&tx).await;
        self.transition(EmitterState::Done);
        metrics::record_stream_outcome(outcome.label());
        outcome
    }

    async fn emit(&mut self, tx: &mpsc::Sender<FrameResult>) -> EmissionOutcome {
        self.transition(EmitterState::Starting);
        if !self.lead_in.is_zero() && !pause(tx, self.lead_in).await {
            return self.cancelled();
        }

        let sse = self.spec.sse;
        let chunk_delay = self.spec.chunk_delay;
        let source = std::mem::replace(&mut self.spec.source, ChunkSource::Eager(Vec::new()));
        let mut chunks = source.into_stream();

        loop {
            let next = tokio::select! {
                next = chunks.next() => next,
                _ = tx.closed() => return self.cancelled(),
            };

            let item = match next {
                None => break,
                Some(Ok(item)) => item,
                Some(Err(error)) => {
                    warn!("Chunk source failed after {} chunk(s): {}", self.emitted, error);
                    // Receiver may already be gone; nothing else to do either way.
                    let _ = tx.send(Err(error.clone())).await;
                    return EmissionOutcome::Failed {
                        chunks: self.emitted,
                        error,
                    };
                }
            };

            if self.emitted > 0 && !chunk_delay.is_zero() && !pause(tx, chunk_delay).await {
                return self.cancelled();
            }

            self.transition(EmitterState::Emitting(self.emitted));
            if !write(tx, item.render(sse)).await {
                return self.cancelled();
            }
            self.emitted += 1;
            metrics::record_stream_chunk(sse);
        }

        self.transition(EmitterState::Closing);
        if let Some(sentinel) = self.spec.terminal_sentinel.take() {
            let text = if sse {
                SseEvent::data(sentinel).encode()
            } else {
                sentinel
            };
            if !write(tx, text).await {
                return self.cancelled();
            }
        }

        EmissionOutcome::Completed {
            chunks: self.emitted,
        }
    }

    fn cancelled(&self) -> EmissionOutcome {
        debug!(
            "Stream cancelled by client in state {:?} after {} chunk(s)",
            self.state, self.emitted
        );
        EmissionOutcome::Cancelled {
            chunks: self.emitted,
        }
    }
}

/// Sleep unless the receiver goes away first. Returns false on cancellation.
async fn pause(tx: &mpsc::Sender<FrameResult>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = tx.closed() => false,
    }
}

async fn write(tx: &mpsc::Sender<FrameResult>, text: String) -> bool {
    tx.send(Ok(Frame::data(Bytes::from(text)))).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::stream::ChunkResult;
    use std::time::Instant;

    async fn drain(mut rx: mpsc::Receiver<FrameResult>) -> (Vec<String>, Option<StreamError>) {
        let mut chunks = Vec::new();
        while let Some(frame) = rx.recv().await {
            match frame {
                Ok(frame) => {
                    let data = frame.into_data().unwrap_or_default();
                    chunks.push(String::from_utf8(data.to_vec()).unwrap());
                }
                Err(e) => return (chunks, Some(e)),
            }
        }
        (chunks, None)
    }

    #[tokio::test]
    async fn test_plain_stream_respects_chunk_delay() {
        let delay = Duration::from_millis(20);
        let spec = StreamSpec::chunks(["All", " we", " need", " is", " Love"]).chunk_delay(delay);
        let (tx, rx) = mpsc::channel(1);

        let started = Instant::now();
        let emitter = tokio::spawn(StreamingEmitter::new(spec, Duration::ZERO).run(tx));
        let (chunks, error) = drain(rx).await;
        let elapsed = started.elapsed();

        assert!(error.is_none());
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.concat(), "All we need is Love");
        assert!(elapsed >= delay * 4, "elapsed {:?}", elapsed);
        assert_eq!(
            emitter.await.unwrap(),
            EmissionOutcome::Completed { chunks: 5 }
        );
    }

    #[tokio::test]
    async fn test_sse_stream_with_sentinel() {
        let spec = StreamSpec::chunks(["a", "b"]).sse().done_sentinel();
        let (tx, rx) = mpsc::channel(8);

        let outcome = StreamingEmitter::new(spec, Duration::ZERO).run(tx).await;
        let (chunks, _) = drain(rx).await;

        assert_eq!(outcome, EmissionOutcome::Completed { chunks: 2 });
        assert_eq!(
            chunks,
            vec!["data: a\n\n", "data: b\n\n", "data: [DONE]\n\n"]
        );
    }

    #[tokio::test]
    async fn test_lead_in_delay() {
        let lead_in = Duration::from_millis(30);
        let (tx, rx) = mpsc::channel(8);

        let started = Instant::now();
        StreamingEmitter::new(StreamSpec::chunks(["x"]), lead_in)
            .run(tx)
            .await;
        let (chunks, _) = drain(rx).await;

        assert!(started.elapsed() >= lead_in);
        assert_eq!(chunks, vec!["x"]);
    }

    #[tokio::test]
    async fn test_client_disconnect_cancels_emission() {
        let spec = StreamSpec::chunks(["1", "2", "3", "4"]).chunk_delay(Duration::from_millis(50));
        let (tx, mut rx) = mpsc::channel(1);

        let emitter = tokio::spawn(StreamingEmitter::new(spec, Duration::ZERO).run(tx));
        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), Bytes::from("1"));
        drop(rx);

        let outcome = emitter.await.unwrap();
        assert_eq!(outcome, EmissionOutcome::Cancelled { chunks: 1 });
    }

    #[tokio::test]
    async fn test_source_failure_ends_with_error_frame() {
        let items: Vec<ChunkResult> =
            vec![Ok("ok".into()), Err(StreamError::failed("upstream reset"))];
        let spec = StreamSpec::from_stream(futures::stream::iter(items)).sentinel("never");
        let (tx, rx) = mpsc::channel(8);

        let outcome = StreamingEmitter::new(spec, Duration::ZERO).run(tx).await;
        let (chunks, error) = drain(rx).await;

        assert_eq!(chunks, vec!["ok"]);
        assert_eq!(error, Some(StreamError::failed("upstream reset")));
        assert_eq!(outcome.chunks(), 1);
        assert!(matches!(outcome, EmissionOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_channel_source_is_fed_by_producer() {
        let (producer, source) = ChunkSource::channel(2);
        let spec = StreamSpec::new(source);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            for word in ["push", "ed"] {
                producer.send(Ok(word.into())).await.unwrap();
            }
        });

        let outcome = StreamingEmitter::new(spec, Duration::ZERO).run(tx).await;
        let (chunks, _) = drain(rx).await;
        assert_eq!(outcome, EmissionOutcome::Completed { chunks: 2 });
        assert_eq!(chunks.concat(), "pushed");
    }

    #[test]
    fn test_new_emitter_is_idle() {
        let emitter = StreamingEmitter::new(StreamSpec::chunks(Vec::<String>::new()), Duration::ZERO);
        assert_eq!(emitter.state(), EmitterState::Idle);
    }
}

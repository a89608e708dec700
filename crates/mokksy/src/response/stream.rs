//! Streaming response descriptions and Server-Sent-Events framing.

use crate::error::StreamError;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sentinel expected by OpenAI-style streaming clients.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A single Server-Sent-Event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
    pub retry: Option<Duration>,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Encode using `text/event-stream` framing.
    ///
    /// Data is split on every SSE line terminator (`\r\n`, `\r`, `\n`) into
    /// one `data:` line each, so a client joining them with `\n` gets the
    /// original text back. Line breaks in `id` and `event` are stripped. The
    /// event ends with a blank line.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if let Some(id) = &self.id {
            out.push_str(&format!("id: {}\n", single_line(id)));
        }
        if let Some(event) = &self.event {
            out.push_str(&format!("event: {}\n", single_line(event)));
        }
        for line in self
            .data
            .split("\r\n")
            .flat_map(|part| part.split(['\r', '\n']))
        {
            out.push_str(&format!("data: {line}\n"));
        }
        if let Some(retry) = self.retry {
            out.push_str(&format!("retry: {}\n", retry.as_millis()));
        }
        out.push('\n');
        out
    }
}

fn single_line(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

/// One element produced by a chunk source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Text(String),
    Event(SseEvent),
}

impl StreamItem {
    /// Wire form of this item.
    ///
    /// In SSE mode text becomes a data-only event; in plain mode an event
    /// contributes only its data.
    pub fn render(&self, sse: bool) -> String {
        match (self, sse) {
            (StreamItem::Text(text), false) => text.clone(),
            (StreamItem::Text(text), true) => SseEvent::data(text.as_str()).encode(),
            (StreamItem::Event(event), false) => event.data.clone(),
            (StreamItem::Event(event), true) => event.encode(),
        }
    }
}

impl From<String> for StreamItem {
    fn from(text: String) -> Self {
        StreamItem::Text(text)
    }
}

impl From<&str> for StreamItem {
    fn from(text: &str) -> Self {
        StreamItem::Text(text.to_string())
    }
}

impl From<SseEvent> for StreamItem {
    fn from(event: SseEvent) -> Self {
        StreamItem::Event(event)
    }
}

pub type ChunkResult = Result<StreamItem, StreamError>;

/// Where stream chunks come from. Each source is consumed once.
pub enum ChunkSource {
    /// All chunks known up front.
    Eager(Vec<StreamItem>),
    /// Pulled lazily; may fail.
    Lazy(BoxStream<'static, ChunkResult>),
    /// Pushed by a producer holding the matching sender.
    Channel(mpsc::Receiver<ChunkResult>),
}

impl ChunkSource {
    /// A bounded channel source and the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ChunkResult>, ChunkSource) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, ChunkSource::Channel(rx))
    }

    pub(crate) fn into_stream(self) -> BoxStream<'static, ChunkResult> {
        match self {
            ChunkSource::Eager(items) => futures::stream::iter(items.into_iter().map(Ok)).boxed(),
            ChunkSource::Lazy(stream) => stream,
            ChunkSource::Channel(mut rx) => {
                futures::stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed()
            }
        }
    }
}

impl fmt::Debug for ChunkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSource::Eager(items) => f.debug_tuple("Eager").field(&items.len()).finish(),
            ChunkSource::Lazy(_) => f.write_str("Lazy"),
            ChunkSource::Channel(_) => f.write_str("Channel"),
        }
    }
}

/// A time-phased streaming body.
#[derive(Debug)]
pub struct StreamSpec {
    pub source: ChunkSource,
    pub chunk_delay: Duration,
    pub sse: bool,
    pub terminal_sentinel: Option<String>,
}

impl StreamSpec {
    pub fn new(source: ChunkSource) -> Self {
        Self {
            source,
            chunk_delay: Duration::ZERO,
            sse: false,
            terminal_sentinel: None,
        }
    }

    /// Stream a fixed list of chunks.
    pub fn chunks<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<StreamItem>,
    {
        Self::new(ChunkSource::Eager(
            chunks.into_iter().map(Into::into).collect(),
        ))
    }

    /// Stream items pulled from an async stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = ChunkResult> + Send + 'static,
    {
        Self::new(ChunkSource::Lazy(stream.boxed()))
    }

    pub fn from_channel(rx: mpsc::Receiver<ChunkResult>) -> Self {
        Self::new(ChunkSource::Channel(rx))
    }

    /// Minimum pause between two consecutive chunks.
    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Frame chunks as Server-Sent-Events.
    pub fn sse(mut self) -> Self {
        self.sse = true;
        self
    }

    /// Written once after the last chunk.
    pub fn sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.terminal_sentinel = Some(sentinel.into());
        self
    }

    pub fn done_sentinel(self) -> Self {
        self.sentinel(DONE_SENTINEL)
    }
}

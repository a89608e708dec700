//! HTTP body types served by the mock server.

use crate::error::StreamError;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Body, Frame, SizeHint};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Body type of every response the server writes.
pub type MockBody = BoxBody<Bytes, StreamError>;

pub type FrameResult = Result<Frame<Bytes>, StreamError>;

pub fn full(payload: impl Into<Bytes>) -> MockBody {
    Full::new(payload.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

pub fn empty() -> MockBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// Body fed frame by frame through a channel.
///
/// Dropping the body (client gone, connection closed) closes the channel,
/// which is how the producer observes cancellation.
#[derive(Debug)]
pub struct ChannelBody {
    rx: mpsc::Receiver<FrameResult>,
}

impl ChannelBody {
    /// A body and the sender that feeds it.
    ///
    /// A capacity of one keeps the producer at most one frame ahead of the
    /// connection.
    pub fn channel(capacity: usize) -> (mpsc::Sender<FrameResult>, ChannelBody) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, ChannelBody { rx })
    }

    pub fn boxed(self) -> MockBody {
        BoxBody::new(self)
    }
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = StreamError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut().rx.poll_recv(cx)
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_body_collects() {
        let bytes = full("hello").collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from("hello"));
        assert!(empty().collect().await.unwrap().to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_channel_body_yields_frames_then_ends() {
        let (tx, body) = ChannelBody::channel(4);
        tx.send(Ok(Frame::data(Bytes::from("a")))).await.unwrap();
        tx.send(Ok(Frame::data(Bytes::from("b")))).await.unwrap();
        drop(tx);

        let bytes = body.boxed().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from("ab"));
    }

    #[tokio::test]
    async fn test_channel_body_propagates_error() {
        let (tx, body) = ChannelBody::channel(4);
        tx.send(Ok(Frame::data(Bytes::from("a")))).await.unwrap();
        tx.send(Err(StreamError::failed("boom"))).await.unwrap();
        drop(tx);

        let err = body.boxed().collect().await.unwrap_err();
        assert_eq!(err.to_string(), "Chunk source failed: boom");
    }

    #[tokio::test]
    async fn test_dropping_body_closes_sender() {
        let (tx, body) = ChannelBody::channel(1);
        drop(body);
        tx.closed().await;
        assert!(tx.send(Ok(Frame::data(Bytes::new()))).await.is_err());
    }
}

//! An in-process [`ResponseWriter`] that turns writer calls into an `http::Response`.
//!
//! The head travels through a oneshot channel as soon as it is written; body chunks travel
//! through a bounded mpsc channel which also provides the write acknowledgement: a
//! `write_body` call resolves once the receiving [`ResponseBody`] has room for the chunk.

use crate::writer::{ResponseWriter, WriteError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::SinkExt;
use http::{HeaderMap, Response, StatusCode};
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::StreamBody;
use http_body_util::combinators::UnsyncBoxBody;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("response aborted")]
    Aborted,

    #[error("response writer dropped without completion")]
    Dropped,
}

type HeadSender = oneshot::Sender<Result<Response<ResponseBody>, ResponseError>>;
type FrameSender = mpsc::Sender<Result<Frame<Bytes>, ResponseError>>;

/// Creates a writer together with the receiver of the response it produces.
///
/// `buffer` bounds how many body chunks may be in flight before `write_body` waits.
pub fn channel_writer(buffer: usize) -> (ChannelWriter, ResponseReceiver) {
    let (head_sender, head_receiver) = oneshot::channel();
    (ChannelWriter { head: Some(head_sender), body: None, buffer }, ResponseReceiver { head_receiver })
}

#[derive(Debug)]
pub struct ChannelWriter {
    head: Option<HeadSender>,
    body: Option<FrameSender>,
    buffer: usize,
}

#[async_trait]
impl ResponseWriter for ChannelWriter {
    fn write_header(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), WriteError> {
        let head = self.head.take().ok_or(WriteError::HeaderAlreadyWritten)?;

        let (frame_sender, frame_receiver) = mpsc::channel(self.buffer);
        let mut response = Response::new(ResponseBody::stream(StreamBody::new(frame_receiver)));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        head.send(Ok(response)).map_err(|_| WriteError::Closed)?;
        self.body = Some(frame_sender);
        Ok(())
    }

    async fn write_body(&mut self, data: Bytes) -> Result<(), WriteError> {
        let sender = self.body.as_mut().ok_or(WriteError::HeaderNotWritten)?;
        sender.send(Ok(Frame::data(data))).await.map_err(|_| WriteError::Closed)
    }

    fn done(self: Box<Self>) {
        if let Some(head) = self.head {
            warn!("response completed without header, answer with an empty 200");
            let _ = head.send(Ok(Response::new(ResponseBody::empty())));
        }
        // dropping the frame sender ends the body stream
    }

    fn abort(self: Box<Self>) {
        let ChannelWriter { head, body, .. } = *self;
        if let Some(head) = head {
            let _ = head.send(Err(ResponseError::Aborted));
        }
        if let Some(mut body) = body {
            let _ = body.try_send(Err(ResponseError::Aborted));
        }
    }
}

/// The receiving half of [`channel_writer`].
#[derive(Debug)]
pub struct ResponseReceiver {
    head_receiver: oneshot::Receiver<Result<Response<ResponseBody>, ResponseError>>,
}

impl ResponseReceiver {
    /// Waits for the response head.
    ///
    /// Resolves as soon as the header has been written, the body keeps streaming afterward.
    pub async fn response(self) -> Result<Response<ResponseBody>, ResponseError> {
        self.head_receiver.await.unwrap_or(Err(ResponseError::Dropped))
    }
}

/// The body of a response produced by a [`ChannelWriter`].
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Empty,
    Stream(UnsyncBoxBody<Bytes, ResponseError>),
}

impl ResponseBody {
    /// A body with no frames.
    pub fn empty() -> Self {
        Self { inner: Kind::Empty }
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes, Error = ResponseError> + Send + 'static,
    {
        Self { inner: Kind::Stream(UnsyncBoxBody::new(body)) }
    }

    /// Collects the whole body, failing on the first error frame.
    pub async fn collect_bytes(self) -> Result<Bytes, ResponseError> {
        http_body_util::BodyExt::collect(self).await.map(http_body_util::Collected::to_bytes)
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Kind::Empty => f.write_str("ResponseBody::Empty"),
            Kind::Stream(_) => f.write_str("ResponseBody::Stream"),
        }
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = ResponseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Empty => Poll::Ready(None),
            Kind::Stream(box_body) => Pin::new(box_body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Empty => true,
            Kind::Stream(box_body) => box_body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Empty => SizeHint::with_exact(0),
            Kind::Stream(box_body) => box_body.size_hint(),
        }
    }
}

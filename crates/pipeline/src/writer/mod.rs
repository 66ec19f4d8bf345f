//! The response writer capability and its stock implementations.
//!
//! A [`ResponseWriter`] is handed to exactly one party at a time. Its terminal actions,
//! [`ResponseWriter::done`] and [`ResponseWriter::abort`], consume the boxed writer, so a
//! response cannot be completed twice and a writer that was completed cannot be written to.
//! Dropping a writer without a terminal action leaks the response on the transport side and
//! must be avoided on every code path.

mod channel;
mod date;

pub use channel::ChannelWriter;
pub use channel::ResponseBody;
pub use channel::ResponseError;
pub use channel::ResponseReceiver;
pub use channel::channel_writer;
pub use date::DateHeader;
pub use date::DateService;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use thiserror::Error;
use tracing::error;

/// An owned writer, passed by value so its terminal action can consume it.
pub type BoxResponseWriter = Box<dyn ResponseWriter>;

#[async_trait]
pub trait ResponseWriter: Send {
    /// Writes the status line and headers. Must be called at most once.
    fn write_header(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), WriteError>;

    /// Writes a body chunk; resolves once the chunk has been accepted by the transport.
    async fn write_body(&mut self, data: Bytes) -> Result<(), WriteError>;

    /// Completes the response.
    fn done(self: Box<Self>);

    /// Aborts the response, the transport should drop the exchange.
    fn abort(self: Box<Self>);
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WriteError {
    #[error("response header has already been written")]
    HeaderAlreadyWritten,

    #[error("response header must be written before the body")]
    HeaderNotWritten,

    #[error("response channel closed")]
    Closed,
}

/// Writes a complete response and ends it with exactly one terminal action.
///
/// The writer is completed when every write succeeded and aborted otherwise.
pub(crate) async fn respond(mut writer: BoxResponseWriter, status: StatusCode, headers: HeaderMap, body: Option<Bytes>) {
    if let Err(e) = writer.write_header(status, headers) {
        error!(cause = %e, "failed to write response header");
        writer.abort();
        return;
    }

    if let Some(bytes) = body
        && let Err(e) = writer.write_body(bytes).await
    {
        error!(cause = %e, "failed to write response body");
        writer.abort();
        return;
    }

    writer.done();
}


#[cfg(test)]
mod tests {
    use super::testing::{Recorder, WriterEvent};
    use super::*;

    #[tokio::test]
    async fn respond_writes_then_completes() {
        let recorder = Recorder::default();
        respond(Box::new(recorder.writer()), StatusCode::OK, HeaderMap::new(), Some(Bytes::from_static(b"hi"))).await;

        let events = recorder.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], WriterEvent::Header(status, _) if *status == StatusCode::OK));
        assert_eq!(events[1], WriterEvent::Body(Bytes::from_static(b"hi")));
        assert_eq!(events[2], WriterEvent::Done);
    }

    #[tokio::test]
    async fn respond_without_body_still_completes() {
        let recorder = Recorder::default();
        respond(Box::new(recorder.writer()), StatusCode::NO_CONTENT, HeaderMap::new(), None).await;

        assert_eq!(recorder.events().len(), 2);
        assert_eq!(recorder.events()[1], WriterEvent::Done);
    }

    #[tokio::test]
    async fn respond_aborts_when_header_fails() {
        let recorder = Recorder::default();
        let mut writer = recorder.writer();
        writer.write_header(StatusCode::OK, HeaderMap::new()).unwrap();

        respond(Box::new(writer), StatusCode::OK, HeaderMap::new(), Some(Bytes::from_static(b"late"))).await;

        assert_eq!(recorder.terminal_count(), 1);
        assert_eq!(recorder.events().last(), Some(&WriterEvent::Abort));
    }
}

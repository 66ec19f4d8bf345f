//! In-process entry point: `http::Request` in, `http::Response` out.

use crate::coordinator::Coordinator;
use crate::writer::{ResponseBody, ResponseError, channel_writer};
use crate::RequestHeader;
use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;
use std::fmt::Display;
use std::sync::Arc;
use tracing::trace;

/// How many response body chunks may be in flight before the writer waits for the reader.
const RESPONSE_BUFFER: usize = 16;

impl Coordinator {
    /// Serves one request on a dedicated tokio task and waits for the response head.
    ///
    /// The returned response body keeps streaming while the handler writes. A handler that
    /// aborts before writing the header yields [`ResponseError::Aborted`], one that aborts
    /// later surfaces the error from the body.
    pub async fn serve<B>(self: Arc<Self>, request: Request<B>) -> Result<Response<ResponseBody>, ResponseError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Display + Send,
    {
        let (parts, body) = request.into_parts();
        let (writer, receiver) = channel_writer(RESPONSE_BUFFER);

        tokio::spawn(async move {
            let request = RequestHeader::from(parts);
            let mode = self.handle(request, body, Box::new(writer)).await;
            trace!(?mode, "request pipeline returned");
        });

        receiver.response().await
    }
}

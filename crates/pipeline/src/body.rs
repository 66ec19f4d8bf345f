//! Streaming assembly of the request body for the params-with-body handler variant.
//!
//! # Lifecycle
//!
//! A [`BodyAssembler`] is created by the coordinator once the route resolved to
//! [`HandlerVariant::ParamsWithBody`](crate::handler::HandlerVariant::ParamsWithBody). It owns
//! everything the handler call needs (request, context, route params, endpoint and the
//! post-processed writer) together with the body buffer, and is driven by chunk events:
//!
//! ```text
//!                  Data(non-empty) / Data(empty)
//!                        +------+
//!                        v      |
//!   new() -------> Accumulating-+---- End ------> Finished
//!                        |
//!                        +---- Error / over limit ---> Aborted
//! ```
//!
//! Reaching `Finished` invokes the handler and completes the writer, reaching `Aborted` aborts
//! it. Events after either terminal state are ignored and answered with [`Flow::Stop`].
//!
//! `on_event` never waits on other requests or on pre-processor deferrals, the only await
//! point is the write of the final response once the body has ended.

use crate::extract::ParamSources;
use crate::handler::{BodyEndpoint, BodyReply};
use crate::request::{PathParams, QueryParams};
use crate::writer::{BoxResponseWriter, respond};
use crate::{Context, RequestHeader};
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use http_body::Body;
use http_body_util::BodyExt;
use std::fmt::Display;
use std::mem;
use std::pin::pin;
use thiserror::Error;
use tracing::{error, trace, warn};

/// An inbound event of the request body stream.
#[derive(Debug)]
pub enum ChunkEvent {
    /// A chunk of body bytes, possibly empty.
    Data(Bytes),
    /// The body ended normally.
    End,
    /// The body stream failed and no further chunks will arrive.
    Error(BodyError),
}

/// Whether the transport should keep delivering chunk events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The chunk was taken, deliver the next event.
    Continue,
    /// The assembler reached a terminal state, stop delivering.
    Stop,
}

/// Why the body stream ended abnormally.
#[derive(Error, Debug)]
pub enum BodyError {
    #[error("request body stream failed: {reason}")]
    Stream { reason: String },

    #[error("request body exceeds the limit of {limit} bytes")]
    TooLarge { limit: usize },
}

impl BodyError {
    pub fn stream<S: ToString>(str: S) -> Self {
        Self::Stream { reason: str.to_string() }
    }

    pub fn too_large(limit: usize) -> Self {
        Self::TooLarge { limit }
    }
}

/// The observable state of a [`BodyAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Accumulating,
    Finished,
    Aborted,
}

/// Buffers the request body and invokes the params-with-body handler once it ended.
///
/// The assembler owns the post-processed writer until it reaches a terminal state. Dropping it
/// while still accumulating aborts the writer.
pub struct BodyAssembler {
    state: State,
}

enum State {
    Accumulating(Box<Pending>),
    Finished,
    Aborted,
}

struct Pending {
    buffer: BytesMut,
    max_size: Option<usize>,
    request: RequestHeader,
    context: Context,
    path_params: Option<PathParams>,
    query: Option<QueryParams>,
    endpoint: BodyEndpoint,
    writer: BoxResponseWriter,
}

impl BodyAssembler {
    pub(crate) fn new(request: RequestHeader, context: Context, endpoint: BodyEndpoint, writer: BoxResponseWriter) -> Self {
        let pending = Pending {
            buffer: BytesMut::new(),
            max_size: None,
            request,
            context,
            path_params: None,
            query: None,
            endpoint,
            writer,
        };
        Self { state: State::Accumulating(Box::new(pending)) }
    }

    pub(crate) fn with_params(mut self, path_params: Option<PathParams>, query: Option<QueryParams>) -> Self {
        if let State::Accumulating(pending) = &mut self.state {
            pending.path_params = path_params;
            pending.query = query;
        }
        self
    }

    pub(crate) fn with_limit(mut self, max_size: Option<usize>) -> Self {
        if let State::Accumulating(pending) = &mut self.state {
            pending.max_size = max_size;
        }
        self
    }

    /// Where the assembler is in its lifecycle.
    pub fn state(&self) -> AssemblerState {
        match self.state {
            State::Accumulating(_) => AssemblerState::Accumulating,
            State::Finished => AssemblerState::Finished,
            State::Aborted => AssemblerState::Aborted,
        }
    }

    /// Number of body bytes buffered so far, zero once the assembler left `Accumulating`.
    pub fn buffered(&self) -> usize {
        match &self.state {
            State::Accumulating(pending) => pending.buffer.len(),
            _ => 0,
        }
    }

    /// Feeds one event into the state machine.
    ///
    /// `Flow::Continue` acknowledges a data chunk, the transport may release it and deliver the
    /// next one. `Flow::Stop` asks the transport to stop delivering events for this request.
    pub async fn on_event(&mut self, event: ChunkEvent) -> Flow {
        match event {
            ChunkEvent::Data(bytes) => self.on_data(bytes),
            ChunkEvent::End => self.on_end().await,
            ChunkEvent::Error(e) => self.abort(e),
        }
    }

    /// Pumps a whole [`http_body::Body`] through the assembler, returning the final state.
    ///
    /// Trailer frames are skipped.
    pub async fn consume<B>(mut self, body: B) -> AssemblerState
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let mut body = pin!(body);
        loop {
            let event = match body.frame().await {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => ChunkEvent::Data(data),
                    Err(_trailers) => continue,
                },
                Some(Err(e)) => ChunkEvent::Error(BodyError::stream(e)),
                None => ChunkEvent::End,
            };

            if self.on_event(event).await == Flow::Stop {
                return self.state();
            }
        }
    }

    fn on_data(&mut self, bytes: Bytes) -> Flow {
        let State::Accumulating(pending) = &mut self.state else {
            return Flow::Stop;
        };

        if bytes.is_empty() {
            return Flow::Continue;
        }

        if let Some(limit) = pending.max_size
            && pending.buffer.len() + bytes.len() > limit
        {
            return self.abort(BodyError::too_large(limit));
        }

        pending.buffer.extend_from_slice(&bytes);
        trace!(chunk = bytes.len(), buffered = pending.buffer.len(), "buffered request body chunk");
        Flow::Continue
    }

    async fn on_end(&mut self) -> Flow {
        let pending = match mem::replace(&mut self.state, State::Finished) {
            State::Accumulating(pending) => pending,
            terminal => {
                self.state = terminal;
                return Flow::Stop;
            }
        };

        let Pending { buffer, request, context, path_params, query, endpoint, writer, .. } = *pending;
        let sources = ParamSources::new(path_params.as_ref(), query.as_ref(), request.headers());

        match endpoint.serve_with_body(&request, &context, &sources, buffer.freeze()) {
            Ok(BodyReply { status, headers, body }) => respond(writer, status, headers, body).await,
            Err(e) => {
                warn!(path = %request.path(), cause = %e, "failed to build body handler parameters");
                reject(writer);
            }
        }

        Flow::Stop
    }

    fn abort(&mut self, cause: BodyError) -> Flow {
        match mem::replace(&mut self.state, State::Aborted) {
            State::Accumulating(pending) => {
                warn!(path = %pending.request.path(), buffered = pending.buffer.len(), cause = %cause, "request body aborted");
                pending.writer.abort();
            }
            terminal => self.state = terminal,
        }
        Flow::Stop
    }
}

/// Answers a body request whose parameters could not be built.
///
/// This path does not go through the failure handler.
fn reject(mut writer: BoxResponseWriter) {
    let mut headers = HeaderMap::with_capacity(1);
    headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

    match writer.write_header(StatusCode::NOT_FOUND, headers) {
        Ok(()) => writer.done(),
        Err(e) => {
            error!(cause = %e, "failed to write response header");
            writer.abort();
        }
    }
}

impl Drop for BodyAssembler {
    fn drop(&mut self) {
        if let State::Accumulating(pending) = mem::replace(&mut self.state, State::Aborted) {
            warn!(path = %pending.request.path(), buffered = pending.buffer.len(), "body assembler dropped before the body ended");
            pending.writer.abort();
        }
    }
}

impl std::fmt::Debug for BodyAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyAssembler").field("state", &self.state()).field("buffered", &self.buffered()).finish()
    }
}

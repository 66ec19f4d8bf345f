//! Type erasure for the handler variants that build parameters.
//!
//! A handler's parameters type is an associated type, so the typed handler traits cannot be
//! used as trait objects directly. The endpoints below keep the handler behind an object
//! safe trait that performs parameter construction first and only then takes the writer,
//! which lets the coordinator keep the writer for the failure path when construction fails.

use crate::extract::{FromParams, FromParamsWithBody, ParamSources, ParamsError};
use crate::handler::{BodyHandler, BodyResponse, ParamsHandler, ProcessingMode};
use crate::writer::BoxResponseWriter;
use crate::{Context, RequestHeader};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

pub(crate) type PreparedCall<'a> =
    Box<dyn FnOnce(RequestHeader, Context, BoxResponseWriter) -> BoxFuture<'a, ProcessingMode> + Send + 'a>;

trait ErasedParamsHandler: Send + Sync {
    fn prepare<'a>(&'a self, sources: &ParamSources<'_>) -> Result<PreparedCall<'a>, ParamsError>;
}

impl<H: ParamsHandler> ErasedParamsHandler for H {
    fn prepare<'a>(&'a self, sources: &ParamSources<'_>) -> Result<PreparedCall<'a>, ParamsError> {
        let params = H::Params::from_params(sources)?;
        Ok(Box::new(move |request, context, writer| self.serve(request, context, params, writer)))
    }
}

/// A [`ParamsHandler`] with its parameters type erased.
#[derive(Clone)]
pub struct ParamsEndpoint {
    inner: Arc<dyn ErasedParamsHandler>,
}

impl ParamsEndpoint {
    pub(crate) fn new<H: ParamsHandler>(handler: H) -> Self {
        Self { inner: Arc::new(handler) }
    }

    /// Builds the parameters, returning the call that still needs the writer.
    pub(crate) fn prepare(&self, sources: &ParamSources<'_>) -> Result<PreparedCall<'_>, ParamsError> {
        self.inner.prepare(sources)
    }
}

/// What a body handler produced, with the response object already turned into bytes.
#[derive(Debug)]
pub(crate) struct BodyReply {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

trait ErasedBodyHandler: Send + Sync {
    fn serve_with_body(
        &self,
        request: &RequestHeader,
        context: &Context,
        sources: &ParamSources<'_>,
        body: Bytes,
    ) -> Result<BodyReply, ParamsError>;
}

impl<H: BodyHandler> ErasedBodyHandler for H {
    fn serve_with_body(
        &self,
        request: &RequestHeader,
        context: &Context,
        sources: &ParamSources<'_>,
        body: Bytes,
    ) -> Result<BodyReply, ParamsError> {
        let params = H::Params::from_params_with_body(sources, body)?;
        let (status, headers, response) = self.serve(request, context, params);
        Ok(BodyReply { status, headers, body: response.into_body_bytes() })
    }
}

/// A [`BodyHandler`] with its parameters and response types erased.
#[derive(Clone)]
pub struct BodyEndpoint {
    inner: Arc<dyn ErasedBodyHandler>,
}

impl BodyEndpoint {
    pub(crate) fn new<H: BodyHandler>(handler: H) -> Self {
        Self { inner: Arc::new(handler) }
    }

    pub(crate) fn serve_with_body(
        &self,
        request: &RequestHeader,
        context: &Context,
        sources: &ParamSources<'_>,
        body: Bytes,
    ) -> Result<BodyReply, ParamsError> {
        self.inner.serve_with_body(request, context, sources, body)
    }
}

impl std::fmt::Debug for ParamsEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ParamsEndpoint")
    }
}

impl std::fmt::Debug for BodyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BodyEndpoint")
    }
}

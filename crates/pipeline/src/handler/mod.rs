//! Handler contracts and the closed set of handler variants.
//!
//! A resolved route carries exactly one [`HandlerVariant`]. The coordinator matches on it
//! exhaustively, so a new variant cannot be added without revisiting every dispatch site.
//!
//! | variant            | parameters            | body                   | writes          |
//! |--------------------|-----------------------|------------------------|-----------------|
//! | `NoParams`         | none                  | not consumed           | the handler     |
//! | `Params`           | path, query, headers  | not consumed           | the handler     |
//! | `ParamsWithBody`   | path, query, headers  | assembled before call  | the coordinator |
//! | `Files`            | trailing path         | not consumed           | the file server |

mod endpoint;
mod failure;
mod response;

pub use endpoint::BodyEndpoint;
pub use endpoint::ParamsEndpoint;
pub use failure::FailureHandler;
pub use failure::NotFound;
pub use response::BodyResponse;

pub(crate) use endpoint::BodyReply;

use crate::extract::{FromParams, FromParamsWithBody};
use crate::writer::BoxResponseWriter;
use crate::{Context, RequestHeader};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

/// How a handler left the response when its `serve` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// The response was completed before `serve` returned.
    Completed,
    /// The handler kept the writer and completes it later, e.g. from a spawned task.
    Pending,
}

/// A handler that needs neither parameters nor the request body.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn serve(&self, request: RequestHeader, context: Context, writer: BoxResponseWriter) -> ProcessingMode;
}

/// A handler that needs parameters built from the route but not the request body.
#[async_trait]
pub trait ParamsHandler: Send + Sync + 'static {
    type Params: FromParams + Send + 'static;

    async fn serve(
        &self,
        request: RequestHeader,
        context: Context,
        params: Self::Params,
        writer: BoxResponseWriter,
    ) -> ProcessingMode;
}

/// A handler that needs parameters built from the route and the whole request body.
///
/// It runs once the body has been assembled and does not write by itself: the returned
/// status, headers and response object are written by the coordinator.
pub trait BodyHandler: Send + Sync + 'static {
    type Params: FromParamsWithBody;
    type Response: BodyResponse;

    fn serve(&self, request: &RequestHeader, context: &Context, params: Self::Params) -> (StatusCode, HeaderMap, Self::Response);
}

/// Serves files below a mount point.
///
/// `path` is the part of the request path after the mount, `/` when nothing follows it.
#[async_trait]
pub trait FileServer: Send + Sync {
    async fn serve(&self, request: RequestHeader, context: Context, path: String, writer: BoxResponseWriter) -> ProcessingMode;
}

#[derive(Clone)]
pub enum HandlerVariant {
    NoParams(Arc<dyn RequestHandler>),
    Params(ParamsEndpoint),
    ParamsWithBody(BodyEndpoint),
    Files(Arc<dyn FileServer>),
}

impl HandlerVariant {
    /// Wraps a handler that only needs the request and context.
    pub fn no_params<H: RequestHandler + 'static>(handler: H) -> Self {
        Self::NoParams(Arc::new(handler))
    }

    /// Wraps a handler whose parameters are built from path, query and headers.
    pub fn params<H: ParamsHandler>(handler: H) -> Self {
        Self::Params(ParamsEndpoint::new(handler))
    }

    /// Wraps a handler that also needs the fully buffered request body.
    pub fn params_with_body<H: BodyHandler>(handler: H) -> Self {
        Self::ParamsWithBody(BodyEndpoint::new(handler))
    }

    /// Wraps a file server that receives the path below its mount.
    pub fn files<H: FileServer + 'static>(server: H) -> Self {
        Self::Files(Arc::new(server))
    }

    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerVariant::NoParams(_) => "no-params",
            HandlerVariant::Params(_) => "params",
            HandlerVariant::ParamsWithBody(_) => "params-with-body",
            HandlerVariant::Files(_) => "files",
        }
    }
}

impl std::fmt::Debug for HandlerVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HandlerVariant").field(&self.kind()).finish()
    }
}

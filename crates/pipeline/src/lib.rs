//! The request-handling coordinator of the micro web stack.
//!
//! A [`Coordinator`] sits between the transport and the application handlers. For every
//! request it runs the pre-processor chain, resolves the route, wraps the response writer
//! with the post-processor chain and dispatches to one of the four handler variants, falling
//! back to the failure handler when routing or parameter construction fails.
//!
//! ```
//! use micro_pipeline::handler::{HandlerVariant, ProcessingMode, RequestHandler};
//! use micro_pipeline::router::{Router, get};
//! use micro_pipeline::writer::{BoxResponseWriter, DateHeader};
//! use micro_pipeline::{Context, Coordinator, RequestHeader};
//! use http::{HeaderMap, StatusCode};
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl RequestHandler for Hello {
//!     async fn serve(&self, _: RequestHeader, _: Context, mut writer: BoxResponseWriter) -> ProcessingMode {
//!         let written = writer.write_header(StatusCode::OK, HeaderMap::new()).is_ok()
//!             && writer.write_body("hello".into()).await.is_ok();
//!         if written { writer.done() } else { writer.abort() }
//!         ProcessingMode::Completed
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::builder().route("/", get(HandlerVariant::no_params(Hello))).build()?;
//! let coordinator = Coordinator::builder().resolver(router).add_post_processor(DateHeader).build()?;
//! # let _ = coordinator;
//! # Ok(())
//! # }
//! ```

mod context;
mod coordinator;
mod request;
mod service;

pub mod body;
pub mod extract;
pub mod handler;
pub mod processor;
pub mod router;
pub mod writer;

pub use context::Context;
pub use coordinator::Coordinator;
pub use coordinator::CoordinatorBuildError;
pub use coordinator::CoordinatorBuilder;
pub use coordinator::Dispatch;
pub use request::PathParams;
pub use request::QueryParams;
pub use request::RequestHeader;

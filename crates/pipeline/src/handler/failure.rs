use crate::handler::ProcessingMode;
use crate::writer::{BoxResponseWriter, respond};
use crate::{Context, RequestHeader};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};

/// Handles requests that could not be routed or whose parameters could not be built.
///
/// It receives the post-processed writer and, like any other handler, owns the response from
/// then on.
#[async_trait]
pub trait FailureHandler: Send + Sync {
    async fn serve(&self, request: RequestHeader, context: Context, writer: BoxResponseWriter) -> ProcessingMode;
}

/// The default failure handler: a plain `404 Not Found`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

const NOT_FOUND_BODY: &[u8] = b"404 Not Found";

#[async_trait]
impl FailureHandler for NotFound {
    async fn serve(&self, _request: RequestHeader, _context: Context, writer: BoxResponseWriter) -> ProcessingMode {
        let mut headers = HeaderMap::with_capacity(2);
        if let Ok(content_type) = HeaderValue::from_str(mime::TEXT_PLAIN_UTF_8.as_ref()) {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(NOT_FOUND_BODY.len()));

        respond(writer, StatusCode::NOT_FOUND, headers, Some(Bytes::from_static(NOT_FOUND_BODY))).await;
        ProcessingMode::Completed
    }
}

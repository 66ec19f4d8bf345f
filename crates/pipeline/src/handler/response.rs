use crate::extract::Json;
use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

/// The response object of a [`BodyHandler`](crate::handler::BodyHandler).
///
/// `None` means the response has no body; the header is still written and the response completed.
pub trait BodyResponse {
    fn into_body_bytes(self) -> Option<Bytes>;
}

impl BodyResponse for () {
    fn into_body_bytes(self) -> Option<Bytes> {
        None
    }
}

impl BodyResponse for Bytes {
    fn into_body_bytes(self) -> Option<Bytes> {
        Some(self)
    }
}

impl BodyResponse for String {
    fn into_body_bytes(self) -> Option<Bytes> {
        Some(Bytes::from(self))
    }
}

impl BodyResponse for &'static str {
    fn into_body_bytes(self) -> Option<Bytes> {
        Some(Bytes::from_static(self.as_bytes()))
    }
}

impl BodyResponse for Vec<u8> {
    fn into_body_bytes(self) -> Option<Bytes> {
        Some(Bytes::from(self))
    }
}

impl<T: BodyResponse> BodyResponse for Option<T> {
    fn into_body_bytes(self) -> Option<Bytes> {
        self.and_then(BodyResponse::into_body_bytes)
    }
}

impl<T: Serialize> BodyResponse for Json<T> {
    fn into_body_bytes(self) -> Option<Bytes> {
        match serde_json::to_vec(&self.0) {
            Ok(vec) => Some(Bytes::from(vec)),
            Err(e) => {
                warn!(cause = %e, "failed to serialize json response, writing it without body");
                None
            }
        }
    }
}

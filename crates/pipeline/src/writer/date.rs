//! Adds an RFC 7231 `date` header to every response head.
//!
//! The formatted date is cached per second in a shared [`DateService`] so concurrent
//! requests do not format the same string over and over.

use crate::processor::{PostProcessStatus, PostProcessor};
use crate::writer::{BoxResponseWriter, ResponseWriter, WriteError};
use crate::{Context, RequestHeader};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use once_cell::sync::Lazy;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

static DATE_SERVICE: Lazy<DateService> = Lazy::new(DateService::new);

/// Keeps the current HTTP date string, refreshed when the wall-clock second changes.
#[derive(Debug)]
pub struct DateService {
    current: ArcSwap<CachedDate>,
}

#[derive(Debug)]
struct CachedDate {
    second: u64,
    value: HeaderValue,
}

impl DateService {
    /// Returns the process wide instance.
    pub fn get_global_instance() -> &'static DateService {
        &DATE_SERVICE
    }

    fn new() -> Self {
        let second = unix_second();
        Self { current: ArcSwap::from_pointee(CachedDate { second, value: format_now() }) }
    }

    /// Returns the date header value for the current second.
    pub fn http_date(&self) -> HeaderValue {
        let second = unix_second();
        let cached = self.current.load();
        if cached.second == second {
            return cached.value.clone();
        }

        let value = format_now();
        self.current.store(std::sync::Arc::new(CachedDate { second, value: value.clone() }));
        value
    }
}

fn unix_second() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

fn format_now() -> HeaderValue {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    // faf_http_date always produces visible ascii
    HeaderValue::from_maybe_shared(Bytes::copy_from_slice(&buf)).unwrap_or_else(|e| {
        warn!(cause = %e, "formatted http date is not a valid header value");
        HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT")
    })
}

/// Post-processor that decorates the writer with [`DateWriter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DateHeader;

impl PostProcessor for DateHeader {
    fn process(&self, _request: &RequestHeader, _context: &Context, writer: BoxResponseWriter) -> PostProcessStatus {
        PostProcessStatus::Replace(Box::new(DateWriter { inner: writer, date_service: DateService::get_global_instance() }))
    }
}

/// A writer that inserts the `date` header unless the handler already set one.
pub struct DateWriter {
    inner: BoxResponseWriter,
    date_service: &'static DateService,
}

impl std::fmt::Debug for DateWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateWriter").finish_non_exhaustive()
    }
}

#[async_trait]
impl ResponseWriter for DateWriter {
    fn write_header(&mut self, status: StatusCode, mut headers: HeaderMap) -> Result<(), WriteError> {
        if !headers.contains_key(http::header::DATE) {
            headers.insert(http::header::DATE, self.date_service.http_date());
        }
        self.inner.write_header(status, headers)
    }

    async fn write_body(&mut self, data: Bytes) -> Result<(), WriteError> {
        self.inner.write_body(data).await
    }

    fn done(self: Box<Self>) {
        self.inner.done();
    }

    fn abort(self: Box<Self>) {
        self.inner.abort();
    }
}

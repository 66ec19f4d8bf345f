//! Request-side values that flow through the pipeline.
//!
//! This module contains the immutable request description handed to every stage:
//! - `RequestHeader`: method, uri, version and headers of the inbound request
//! - `PathParams`: named segments captured by route resolution
//! - `QueryParams`: the query string of the resolved request

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use matchit::Params;

/// The request as seen by the pipeline.
///
/// Pre-processors never mutate a `RequestHeader` in place; they build a replacement
/// (usually through [`RequestHeader::into_inner`] and [`From<Request<()>>`]) and the
/// coordinator uses the latest replacement for every later stage.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the path component of the URI
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    /// Returns the raw query string, if any
    pub fn query(&self) -> Option<&str> {
        self.inner.uri().query()
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

/// Path parameters extracted from the URL path of a request.
///
/// For the route "/users/{id}", "id" is a path parameter. The values are owned so a
/// resolved route can outlive the router borrow, e.g. while the body is still streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Gets the value of a path parameter by its name
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.entries.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub(crate) fn retain(&mut self, f: impl Fn(&str) -> bool) {
        self.entries.retain(|(name, _)| f(name));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl From<Params<'_, '_>> for PathParams {
    fn from(params: Params<'_, '_>) -> Self {
        params.iter().collect()
    }
}

/// The query string of a resolved request.
///
/// Keeps the raw string so typed extraction can hand it to a structured decoder,
/// and offers flat name/value lookups on top of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    raw: String,
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parses a raw query string, e.g. `name=micro&page=2`.
    ///
    /// Malformed pairs are kept out of the flat view; the raw string is always preserved.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(&raw).unwrap_or_default();
        Self { raw, pairs }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the first value bound to `name`
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.pairs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

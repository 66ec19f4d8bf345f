//! Composable request filters used to pick one of several handlers bound to the same path.
//!
//! # Examples
//!
//! ```
//! use micro_pipeline::router::filter::{all_filter, get_method, header};
//!
//! let mut combined = all_filter();
//! combined.and(get_method()).and(header("authorization", "Bearer token").unwrap());
//! ```

use crate::RequestHeader;
use http::{HeaderName, HeaderValue, Method};

/// Core trait for request filtering.
///
/// Filters are shared by every request served by a router, hence `Send + Sync`.
pub trait Filter: Send + Sync {
    /// Returns `true` if the request should be handled by the item owning this filter.
    fn matches(&self, req: &RequestHeader) -> bool;
}

struct FnFilter<F: Fn(&RequestHeader) -> bool>(F);

impl<F: Fn(&RequestHeader) -> bool + Send + Sync> Filter for FnFilter<F> {
    fn matches(&self, req: &RequestHeader) -> bool {
        (self.0)(req)
    }
}

/// Creates a new filter from a closure.
///
/// # Example
/// ```
/// use micro_pipeline::router::filter::fn_filter;
///
/// let api_only = fn_filter(|req| req.path().starts_with("/api"));
/// ```
pub fn fn_filter<F>(f: F) -> impl Filter
where
    F: Fn(&RequestHeader) -> bool + Send + Sync,
{
    FnFilter(f)
}

/// Creates a new OR-composed filter chain.
pub fn any_filter() -> AnyFilter {
    AnyFilter::new()
}

/// Compose filters with OR logic.
///
/// An empty chain matches every request.
pub struct AnyFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AnyFilter {
    fn new() -> Self {
        Self { filters: vec![] }
    }

    pub fn or<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl std::fmt::Debug for AnyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyFilter").field("len", &self.filters.len()).finish()
    }
}

impl Filter for AnyFilter {
    fn matches(&self, req: &RequestHeader) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(req))
    }
}

/// Creates a new AND-composed filter chain.
pub fn all_filter() -> AllFilter {
    AllFilter::new()
}

/// Compose filters with AND logic.
///
/// An empty chain matches every request.
pub struct AllFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AllFilter {
    fn new() -> Self {
        Self { filters: vec![] }
    }

    pub fn and<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl std::fmt::Debug for AllFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllFilter").field("len", &self.filters.len()).finish()
    }
}

impl Filter for AllFilter {
    fn matches(&self, req: &RequestHeader) -> bool {
        self.filters.iter().all(|filter| filter.matches(req))
    }
}

#[derive(Debug)]
pub struct MethodFilter(Method);

impl Filter for MethodFilter {
    fn matches(&self, req: &RequestHeader) -> bool {
        self.0.eq(req.method())
    }
}

macro_rules! method_filter {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Creates a filter that matches HTTP ", stringify!($upper_case_method), " requests.")]
        #[inline]
        pub fn $method() -> MethodFilter {
            MethodFilter(Method::$upper_case_method)
        }
    };
}

method_filter!(get_method, GET);
method_filter!(post_method, POST);
method_filter!(put_method, PUT);
method_filter!(delete_method, DELETE);
method_filter!(head_method, HEAD);
method_filter!(options_method, OPTIONS);
method_filter!(patch_method, PATCH);

/// Creates a filter that matches a specific header name and value.
///
/// Fails when the name or the value is not a valid header token.
pub fn header<K, V>(header_name: K, header_value: V) -> Result<HeaderFilter, http::Error>
where
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    let name = <HeaderName as TryFrom<K>>::try_from(header_name).map_err(Into::into)?;
    let value = <HeaderValue as TryFrom<V>>::try_from(header_value).map_err(Into::into)?;
    Ok(HeaderFilter(name, value))
}

#[derive(Debug)]
pub struct HeaderFilter(HeaderName, HeaderValue);

impl Filter for HeaderFilter {
    fn matches(&self, req: &RequestHeader) -> bool {
        req.headers().get(&self.0).is_some_and(|value| self.1.eq(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn request(method: Method, content_type: Option<&str>) -> RequestHeader {
        let mut builder = Request::builder().method(method).uri("/api/items");
        if let Some(value) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, value);
        }
        builder.body(()).unwrap().into()
    }

    #[test]
    fn empty_chains_match_everything() {
        let req = request(Method::GET, None);
        assert!(all_filter().matches(&req));
        assert!(any_filter().matches(&req));
    }

    #[test]
    fn all_requires_every_filter() {
        let mut filter = all_filter();
        filter.and(post_method()).and(header(http::header::CONTENT_TYPE, "application/json").unwrap());

        assert!(filter.matches(&request(Method::POST, Some("application/json"))));
        assert!(!filter.matches(&request(Method::POST, Some("text/plain"))));
        assert!(!filter.matches(&request(Method::GET, Some("application/json"))));
    }

    #[test]
    fn any_requires_one_filter() {
        let mut filter = any_filter();
        filter.or(get_method()).or(head_method());

        assert!(filter.matches(&request(Method::HEAD, None)));
        assert!(!filter.matches(&request(Method::DELETE, None)));
    }

    #[test]
    fn closure_filter() {
        let filter = fn_filter(|req| req.path().starts_with("/api"));
        assert!(filter.matches(&request(Method::GET, None)));
    }

    #[test]
    fn invalid_header_is_an_error() {
        assert!(matches!(header("bad header", "value"), Err(_)));
    }
}

//! Route resolution.
//!
//! [`RouteResolver`] is the seam the coordinator resolves requests through. [`Router`] is the
//! stock implementation: a `matchit` path tree where every path holds a list of items, and the
//! first item whose [`Filter`](filter::Filter) accepts the request wins.

pub mod filter;

use crate::handler::{FileServer, HandlerVariant};
use crate::request::{PathParams, QueryParams};
use crate::RequestHeader;
use filter::{AllFilter, Filter};
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// Maps a request to the handler that serves it.
///
/// Implementations must be pure: the coordinator calls `route` once per request and the
/// result only depends on the request.
#[cfg_attr(test, mockall::automock)]
pub trait RouteResolver: Send + Sync {
    fn route(&self, request: &RequestHeader) -> Option<RouteMatch>;
}

/// A resolved route: the handler variant plus the request data extracted while resolving.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    variant: HandlerVariant,
    path_params: Option<PathParams>,
    query: Option<QueryParams>,
    remainder: Option<String>,
}

impl RouteMatch {
    /// A match with no extracted path params, query or remainder.
    pub fn new(variant: HandlerVariant) -> Self {
        Self { variant, path_params: None, query: None, remainder: None }
    }

    pub fn with_path_params(mut self, path_params: PathParams) -> Self {
        self.path_params = Some(path_params);
        self
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = Some(query);
        self
    }

    /// Sets the part of the path after a file mount, e.g. `/css/site.css`.
    pub fn with_remainder(mut self, remainder: impl Into<String>) -> Self {
        self.remainder = Some(remainder.into());
        self
    }

    pub fn variant(&self) -> &HandlerVariant {
        &self.variant
    }

    pub fn path_params(&self) -> Option<&PathParams> {
        self.path_params.as_ref()
    }

    pub fn query(&self) -> Option<&QueryParams> {
        self.query.as_ref()
    }

    pub fn remainder(&self) -> Option<&str> {
        self.remainder.as_deref()
    }

    pub(crate) fn into_parts(self) -> (HandlerVariant, Option<PathParams>, Option<QueryParams>, Option<String>) {
        (self.variant, self.path_params, self.query, self.remainder)
    }
}

/// Why [`RouterBuilder::build`] failed.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("failed to register route '{route}': {source}")]
    InvalidRoute {
        route: String,
        #[source]
        source: matchit::InsertError,
    },
}

const REMAINDER: &str = "__remainder";

type InnerRouter<T> = matchit::Router<T>;

/// A [`RouteResolver`] over a `matchit` path tree.
pub struct Router {
    inner_router: InnerRouter<Vec<RouterItem>>,
}

struct RouterItem {
    filter: Box<dyn Filter>,
    variant: HandlerVariant,
    captures_remainder: bool,
}

impl Router {
    /// Starts registering routes.
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

impl RouteResolver for Router {
    fn route(&self, request: &RequestHeader) -> Option<RouteMatch> {
        let matched = match self.inner_router.at(request.path()) {
            Ok(matched) => matched,
            Err(e) => {
                trace!(path = %request.path(), cause = %e, "no route registered for path");
                return None;
            }
        };

        let item = matched.value.iter().find(|item| item.filter.matches(request))?;

        let mut path_params = PathParams::from(matched.params);
        let mut route_match = RouteMatch::new(item.variant.clone());

        if item.captures_remainder {
            if let Some(rest) = path_params.get(REMAINDER) {
                route_match = route_match.with_remainder(format!("/{rest}"));
            }
            path_params.retain(|name| name != REMAINDER);
        }

        if !path_params.is_empty() {
            route_match = route_match.with_path_params(path_params);
        }

        if let Some(query) = request.query() {
            route_match = route_match.with_query(QueryParams::parse(query));
        }

        Some(route_match)
    }
}

/// Collects routes until [`RouterBuilder::build`] inserts them into the path tree.
#[derive(Debug, Default)]
pub struct RouterBuilder {
    data: HashMap<String, Vec<RouterItemBuilder>>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Binds an item to a path; items bound to the same path are tried in registration order.
    pub fn route(mut self, route: impl Into<String>, item_builder: RouterItemBuilder) -> Self {
        self.data.entry(route.into()).or_default().push(item_builder);
        self
    }

    /// Mounts a file server under `prefix` for `GET` and `HEAD` requests.
    ///
    /// Paths below the prefix reach the server with their remainder. The prefix itself, with or
    /// without a trailing slash, has no remainder and reaches the server as `/`.
    pub fn files<S: FileServer + 'static>(self, prefix: &str, server: S) -> Self {
        let variant = HandlerVariant::files(server);
        let mount = prefix.trim_end_matches('/');
        let below = format!("{mount}/{{*{REMAINDER}}}");

        let this = if mount.is_empty() {
            self.route("/", file_item(variant.clone(), false))
        } else {
            self.route(mount, file_item(variant.clone(), false))
                .route(format!("{mount}/"), file_item(variant.clone(), false))
        };
        this.route(below, file_item(variant, true))
    }

    /// Fails on the first path `matchit` rejects, e.g. one that conflicts with another path.
    pub fn build(self) -> Result<Router, RouterError> {
        let mut inner_router = InnerRouter::new();

        for (path, items) in self.data.into_iter() {
            let router_items = items.into_iter().map(RouterItemBuilder::build).collect::<Vec<_>>();
            inner_router
                .insert(path.as_str(), router_items)
                .map_err(|source| RouterError::InvalidRoute { route: path.clone(), source })?;
        }

        Ok(Router { inner_router })
    }
}

fn file_item(variant: HandlerVariant, captures_remainder: bool) -> RouterItemBuilder {
    let mut methods = filter::any_filter();
    methods.or(filter::get_method()).or(filter::head_method());

    let mut filters = filter::all_filter();
    filters.and(methods);
    RouterItemBuilder { filters, variant, captures_remainder }
}

/// Matches every method.
pub fn any(variant: HandlerVariant) -> RouterItemBuilder {
    RouterItemBuilder { filters: filter::all_filter(), variant, captures_remainder: false }
}

macro_rules! method_router_filter {
    ($method:ident, $method_name:ident) => {
        #[doc = concat!("Matches `", stringify!($method), "` requests only.")]
        pub fn $method(variant: HandlerVariant) -> RouterItemBuilder {
            let mut filters = filter::all_filter();
            filters.and(filter::$method_name());
            RouterItemBuilder { filters, variant, captures_remainder: false }
        }
    };
}

method_router_filter!(get, get_method);
method_router_filter!(post, post_method);
method_router_filter!(put, put_method);
method_router_filter!(delete, delete_method);
method_router_filter!(head, head_method);
method_router_filter!(options, options_method);
method_router_filter!(patch, patch_method);

/// A handler variant plus the filters a request must pass to reach it.
#[derive(Debug)]
pub struct RouterItemBuilder {
    filters: AllFilter,
    variant: HandlerVariant,
    captures_remainder: bool,
}

impl RouterItemBuilder {
    /// Adds a filter; all filters of an item must accept the request.
    pub fn with<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.and(filter);
        self
    }

    fn build(self) -> RouterItem {
        RouterItem { filter: Box::new(self.filters), variant: self.variant, captures_remainder: self.captures_remainder }
    }
}

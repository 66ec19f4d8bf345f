//! Parameter construction for the handler variants that take parameters.
//!
//! [`FromParams`] builds a value from the path parameters, query parameters and headers of a
//! resolved route; [`FromParamsWithBody`] additionally consumes the assembled request body.
//! Both are fallible: a [`ParamsError`] diverts the request to the failure path.

mod from_body;
mod from_params;

pub use from_body::FromParamsWithBody;
pub use from_params::FromParams;

use crate::request::{PathParams, QueryParams};
use http::HeaderMap;
use thiserror::Error;

/// The inputs available to parameter construction.
#[derive(Debug, Clone, Copy)]
pub struct ParamSources<'a> {
    path: Option<&'a PathParams>,
    query: Option<&'a QueryParams>,
    headers: &'a HeaderMap,
}

impl<'a> ParamSources<'a> {
    pub fn new(path: Option<&'a PathParams>, query: Option<&'a QueryParams>, headers: &'a HeaderMap) -> Self {
        Self { path, query, headers }
    }

    pub fn path(&self) -> Option<&'a PathParams> {
        self.path
    }

    pub fn query(&self) -> Option<&'a QueryParams> {
        self.query
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }
}

#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("invalid path parameters: {reason}")]
    InvalidPath { reason: String },

    #[error("invalid query string: {reason}")]
    InvalidQuery { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },
}

impl ParamsError {
    pub fn invalid_path<S: ToString>(str: S) -> Self {
        Self::InvalidPath { reason: str.to_string() }
    }

    pub fn invalid_query<S: ToString>(str: S) -> Self {
        Self::InvalidQuery { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }
}

/// Represented as typed path parameters
///
/// for the route `/users/{id}/posts/{post}`, the path parameters are deserialized into `T`,
/// note: the struct must impl [`serde::Deserialize`]
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use micro_pipeline::extract::Path;
/// # #[allow(dead_code)]
/// #[derive(Deserialize, Debug)]
/// struct PostId {
///     id: u64,
///     post: String,
/// }
///
/// fn describe(Path(post_id): Path<PostId>) -> String {
///     format!("received params: {:?}", post_id)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path<T>(pub T);

/// Represented as url query data
///
/// when request with url query, we can using this struct to inject data,
/// note: the struct must impl [`serde::Deserialize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<T>(pub T);

/// Represented as json data
///
/// as a body parameter it is decoded from the assembled body, as a body response it is
/// serialized with `serde_json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

/// Represented as form data
///
/// when `post` as a `application/x-www-form-urlencoded`, we can using this struct to inject data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form<T>(pub T);

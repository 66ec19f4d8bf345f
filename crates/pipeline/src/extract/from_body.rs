use crate::extract::{Form, FromParams, Json, ParamSources, ParamsError};
use bytes::Bytes;
use serde::de::DeserializeOwned;

/// Constructs a parameters value from the route sources and the assembled request body.
pub trait FromParamsWithBody: Sized {
    fn from_params_with_body(sources: &ParamSources<'_>, body: Bytes) -> Result<Self, ParamsError>;
}

impl FromParamsWithBody for Bytes {
    fn from_params_with_body(_sources: &ParamSources<'_>, body: Bytes) -> Result<Self, ParamsError> {
        Ok(body)
    }
}

impl FromParamsWithBody for String {
    fn from_params_with_body(_sources: &ParamSources<'_>, body: Bytes) -> Result<Self, ParamsError> {
        // todo: honor the charset of the content-type header
        String::from_utf8(body.into()).map_err(ParamsError::invalid_body)
    }
}

impl<T: DeserializeOwned> FromParamsWithBody for Json<T> {
    fn from_params_with_body(_sources: &ParamSources<'_>, body: Bytes) -> Result<Self, ParamsError> {
        serde_json::from_slice::<T>(&body).map(Json).map_err(ParamsError::invalid_body)
    }
}

impl<T: DeserializeOwned> FromParamsWithBody for Form<T> {
    fn from_params_with_body(_sources: &ParamSources<'_>, body: Bytes) -> Result<Self, ParamsError> {
        serde_urlencoded::from_bytes::<T>(&body).map(Form).map_err(ParamsError::invalid_body)
    }
}

/// Route parameters together with a body value.
impl<P, B> FromParamsWithBody for (P, B)
where
    P: FromParams,
    B: FromParamsWithBody,
{
    fn from_params_with_body(sources: &ParamSources<'_>, body: Bytes) -> Result<Self, ParamsError> {
        let params = P::from_params(sources)?;
        Ok((params, B::from_params_with_body(sources, body)?))
    }
}

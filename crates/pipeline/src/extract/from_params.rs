use crate::extract::{ParamSources, ParamsError, Path, Query};
use http::HeaderMap;
use serde::de::DeserializeOwned;

/// Builds handler parameters from the request data extracted during routing.
///
/// Construction may fail, in which case the request goes to the failure handler.
pub trait FromParams: Sized {
    fn from_params(sources: &ParamSources<'_>) -> Result<Self, ParamsError>;
}

impl FromParams for () {
    fn from_params(_sources: &ParamSources<'_>) -> Result<Self, ParamsError> {
        Ok(())
    }
}

impl FromParams for HeaderMap {
    fn from_params(sources: &ParamSources<'_>) -> Result<Self, ParamsError> {
        Ok(sources.headers().clone())
    }
}

/// A failed construction becomes `None` instead of failing the request.
impl<T: FromParams> FromParams for Option<T> {
    fn from_params(sources: &ParamSources<'_>) -> Result<Self, ParamsError> {
        Ok(T::from_params(sources).ok())
    }
}

impl<T: DeserializeOwned> FromParams for Path<T> {
    fn from_params(sources: &ParamSources<'_>) -> Result<Self, ParamsError> {
        let pairs = sources.path().map(|params| params.iter().collect::<Vec<_>>()).unwrap_or_default();
        // re-encode so scalar fields are parsed from their textual form
        let encoded = serde_urlencoded::to_string(&pairs).map_err(ParamsError::invalid_path)?;
        serde_urlencoded::from_str::<T>(&encoded).map(Path).map_err(ParamsError::invalid_path)
    }
}

impl<T: DeserializeOwned> FromParams for Query<T> {
    fn from_params(sources: &ParamSources<'_>) -> Result<Self, ParamsError> {
        let raw = sources.query().map(|query| query.raw()).unwrap_or_default();
        serde_qs::from_str::<T>(raw).map(Query).map_err(ParamsError::invalid_query)
    }
}

macro_rules! impl_from_params_for_tuple {
    ($($param:ident)*) => {
        impl<$($param,)*> FromParams for ($($param,)*)
        where
            $($param: FromParams,)*
        {
            fn from_params(sources: &ParamSources<'_>) -> Result<Self, ParamsError> {
                Ok(($($param::from_params(sources)?,)*))
            }
        }
    }
}

impl_from_params_for_tuple! { A }
impl_from_params_for_tuple! { A B }
impl_from_params_for_tuple! { A B C }
impl_from_params_for_tuple! { A B C D }
impl_from_params_for_tuple! { A B C D E }
impl_from_params_for_tuple! { A B C D E F }

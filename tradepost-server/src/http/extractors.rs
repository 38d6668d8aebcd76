//! Custom Axum extractors

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use tradepost_core::interaction::parse_id;
use tradepost_core::ValidationError;

use super::error::ApiError;

/// Header carrying the platform user id of whoever triggered the request
pub const ACTOR_HEADER: &str = "x-tradepost-actor";

/// Acting user, taken from the `x-tradepost-actor` header
#[derive(Debug, Clone)]
pub struct Actor(pub String);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Validation(ValidationError::Empty { field: "actor" }))?;

        Ok(Self(value.to_owned()))
    }
}

/// Extract and validate a positive numeric id from the first path segment
pub struct ValidId(pub u64);

impl<S> FromRequestParts<S> for ValidId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(segments): Path<Vec<String>> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "id" }))?;

        let raw = segments
            .first()
            .ok_or(ApiError::Validation(ValidationError::Empty { field: "id" }))?;
        Ok(Self(parse_id("id", raw)?))
    }
}

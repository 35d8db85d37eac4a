//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: read or generate the request correlation ID
//! - [`Operator`]: the user behind the request, from `X-Bk-Username`
//! - [`ValidJson`] / [`ValidQuery`]: JSON body and query string decoding that
//!   reject malformed input with a `400` [`AppError`]
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     Operator(operator): Operator,
//!     ValidJson(body): ValidJson<TransferRequest>,
//! ) -> Result<Json<Value>, AppError> {
//!     tracing::info!(%operator, "Transferring hosts");
//!     Ok(Json(json!({})))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::{CORRELATION_ID_HEADER, RequestContext};
use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Header carrying the user name, set by the gateway in front of the service.
pub const OPERATOR_HEADER: &str = "X-Bk-Username";

/// Correlation ID for request tracing.
///
/// Taken from the [`RequestContext`] when the context layer ran, else from
/// the `X-Correlation-ID` header, else a new UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .extensions
            .get::<RequestContext>()
            .map(|ctx| ctx.correlation_id)
            .or_else(|| {
                parts
                    .headers
                    .get(CORRELATION_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| Uuid::parse_str(s).ok())
            })
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The user performing the request.
///
/// Rejects with `401` when the header is absent or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OPERATOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Self(s.to_string()))
            .ok_or_else(|| AppError::unauthorized(format!("missing {OPERATOR_HEADER} header")))
    }
}

/// JSON body whose decoding errors become `400 VALIDATION_ERROR`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string whose decoding errors become `400 VALIDATION_ERROR`.
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

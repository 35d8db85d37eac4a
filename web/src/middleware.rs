//! Request context layer.
//!
//! [`request_context_layer`] builds a [`RequestContext`] for every request:
//! the `X-Correlation-ID` header (or a fresh UUID), the operator from
//! `X-Bk-Username` and the business id from a `/bizs/{id}/` path segment or a
//! `bk_biz_id` query parameter. The context is stored in the request
//! extensions, the request runs inside an `http_request` span tagged with it,
//! and the correlation id is echoed in the response header.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use dbm_web::middleware::request_context_layer;
//!
//! let app = Router::new()
//!     .route("/apis/db_dirty/query_machine_pool/", get(query_machine_pool))
//!     .layer(request_context_layer());
//! ```

use crate::extractors::OPERATOR_HEADER;
use axum::{
    extract::Request,
    http::{HeaderValue, Uri},
    response::Response,
};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;
use tracing::field::Empty;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Who and what a request is about, as seen at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlation id, taken from the request or generated.
    pub correlation_id: Uuid,
    /// Operator from `X-Bk-Username`, if present.
    pub operator: Option<String>,
    /// Business the request targets, if the URL names one.
    pub bk_biz_id: Option<i64>,
}

impl RequestContext {
    fn from_request(req: &Request) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        Self {
            correlation_id: header(CORRELATION_ID_HEADER)
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_else(Uuid::new_v4),
            operator: header(OPERATOR_HEADER).map(str::to_string),
            bk_biz_id: biz_id_of(req.uri()),
        }
    }
}

/// Business id from `/bizs/{id}/` or `?bk_biz_id=`.
fn biz_id_of(uri: &Uri) -> Option<i64> {
    let mut segments = uri.path().split('/');
    let from_path = segments
        .by_ref()
        .find(|s| *s == "bizs")
        .and_then(|_| segments.next())
        .and_then(|id| id.parse().ok());

    from_path.or_else(|| {
        uri.query()?
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "bk_biz_id")
            .and_then(|(_, value)| value.parse().ok())
    })
}

/// Create a layer that attaches a [`RequestContext`] to all requests.
#[must_use]
pub const fn request_context_layer() -> RequestContextLayer {
    RequestContextLayer
}

/// Layer for [`RequestContext`] tracking.
#[derive(Clone, Debug)]
pub struct RequestContextLayer;

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextMiddleware { inner }
    }
}

/// Middleware service for [`RequestContext`] tracking.
#[derive(Clone, Debug)]
pub struct RequestContextMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for RequestContextMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let context = RequestContext::from_request(&req);
        let correlation_id = context.correlation_id;

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
            operator = Empty,
            bk_biz_id = Empty,
        );
        if let Some(operator) = &context.operator {
            span.record("operator", operator.as_str());
        }
        if let Some(bk_biz_id) = context.bk_biz_id {
            span.record("bk_biz_id", bk_biz_id);
        }

        req.extensions_mut().insert(context);
        let started = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let mut response = fut.await?;
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = started.elapsed().as_millis(),
                    "Request completed"
                );

                if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                    response
                        .headers_mut()
                        .insert(CORRELATION_ID_HEADER, header_value);
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}

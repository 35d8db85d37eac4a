//! Shared HTTP plumbing: configuration, authentication header and response
//! envelope.

use crate::error::{ApiError, ApiResult};
use crate::retry::{RetryPolicy, retry_with_predicate};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings of one external service.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Service root, e.g. `http://bkdbm-dbconfig`.
    pub base_url: String,
    /// Application code sent in the gateway authorization header.
    pub app_code: String,
    /// Application secret sent in the gateway authorization header.
    pub app_secret: String,
    /// Per request timeout.
    pub timeout: Duration,
    /// Backoff for transient failures.
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Config with default timeout (30s) and retry policy.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_code: String::new(),
            app_secret: String::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Set gateway credentials.
    #[must_use]
    pub fn with_credentials(mut self, app_code: impl Into<String>, app_secret: impl Into<String>) -> Self {
        self.app_code = app_code.into();
        self.app_secret = app_secret.into();
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Standard response envelope of the platform services.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default = "default_true")]
    result: bool,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

const fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct Authorization<'a> {
    bk_app_code: &'a str,
    bk_app_secret: &'a str,
}

/// JSON-over-HTTP client for one service.
#[derive(Debug, Clone)]
pub struct BkApiClient {
    client: Client,
    config: ClientConfig,
    service: &'static str,
}

impl BkApiClient {
    /// Create a client for `service` (used as a log and metric label).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RequestFailed`] if the underlying HTTP client
    /// cannot be built.
    pub fn new(service: &'static str, config: ClientConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            config,
            service,
        })
    }

    /// POST `body` to `path` and decode the envelope's `data`, retrying
    /// transient failures.
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, non-success statuses, envelope
    /// errors or undecodable payloads.
    pub async fn post<Req, Resp>(&self, path: &str, body: &Req) -> ApiResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let outcome = retry_with_predicate(
            &self.config.retry,
            || self.post_once(&url, body),
            ApiError::is_retryable,
        )
        .await;

        let label = if outcome.is_ok() { "ok" } else { "error" };
        metrics::counter!("clients.request", "service" => self.service, "outcome" => label)
            .increment(1);
        if let Err(err) = &outcome {
            tracing::warn!(service = self.service, path, error = %err, "External API call failed");
        }
        outcome
    }

    async fn post_once<Req, Resp>(&self, url: &str, body: &Req) -> ApiResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let auth = serde_json::to_string(&Authorization {
            bk_app_code: &self.config.app_code,
            bk_app_secret: &self.config.app_secret,
        })
        .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        tracing::debug!(service = self.service, url, "Calling external API");

        let response = self
            .client
            .post(url)
            .header("X-Bkapi-Authorization", auth)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope = response
            .json::<Envelope>()
            .await
            .map_err(|e| ApiError::ResponseParseFailed(e.to_string()))?;

        if !envelope.result || envelope.code != 0 {
            return Err(ApiError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }

        serde_json::from_value(envelope.data)
            .map_err(|e| ApiError::ResponseParseFailed(e.to_string()))
    }
}

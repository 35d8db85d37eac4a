//! # DBM Clients
//!
//! HTTP clients for the platform services the backend talks to:
//!
//! - [`DbConfigApi`]: configuration items per level (app, cluster, ...)
//! - [`PrivManagerApi`]: component passwords and account rules
//! - [`DrsApi`]: remote SQL execution inside a cloud region
//!
//! Each service is a dyn-compatible trait so callers can hold
//! `Arc<dyn DrsApi>` and swap in recording mocks in tests. The reqwest
//! implementations share [`BkApiClient`], which adds the gateway
//! authorization header, unwraps the `{result, code, message, data}` envelope
//! and retries transient failures with [`RetryPolicy`].

#![forbid(unsafe_code)]

pub mod dbconfig;
pub mod drs;
pub mod error;
pub mod http;
pub mod priv_manager;
pub mod retry;

use std::future::Future;
use std::pin::Pin;

pub use dbconfig::{DbConfigApi, DbConfigClient};
pub use drs::{DrsApi, DrsClient};
pub use error::{ApiError, ApiResult};
pub use http::{BkApiClient, ClientConfig};
pub use priv_manager::{PrivManagerApi, PrivManagerClient};
pub use retry::RetryPolicy;

/// Boxed future returned by every client method.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

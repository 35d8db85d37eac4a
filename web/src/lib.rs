//! HTTP surface of the DB management backend.
//!
//! Handlers are thin: they extract and validate the request, call a service
//! from [`services`] and map domain errors into [`AppError`].
//!
//! # Routes
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/apis/db_dirty/query_dirty_machines/` | [`handlers::dirty::query_dirty_machines`] |
//! | DELETE | `/apis/db_dirty/delete_dirty_records/` | [`handlers::dirty::delete_dirty_records`] |
//! | POST | `/apis/db_dirty/transfer_hosts_to_pool/` | [`handlers::dirty::transfer_hosts_to_pool`] |
//! | GET | `/apis/db_dirty/list_machine_events/` | [`handlers::dirty::list_machine_events`] |
//! | GET | `/apis/db_dirty/query_machine_pool/` | [`handlers::dirty::query_machine_pool`] |
//! | POST | `/apis/proxypass/cloud/insert/` | [`handlers::cloud::insert`] |
//! | POST | `/apis/proxypass/cloud/pull_nginx_conf/` | [`handlers::cloud::pull_nginx_conf`] |
//! | POST | `/apis/sqlserver/bizs/{bk_biz_id}/permission/authorize/pre_check_rules/` | [`handlers::authorize::pre_check_rules`] |
//! | GET | `/apis/tickets/flow_types/` | [`handlers::tickets::flow_types`] |
//! | POST | `/apis/tickets/build_flows/` | [`handlers::tickets::build_flows`] |
//! | GET | `/apis/flow/components/` | [`handlers::components::list_components`] |
//! | POST | `/apis/flow/components/{code}/execute/` | [`handlers::components::execute`] |
//! | GET | `/health` | [`handlers::health_check`] |
//!
//! # Example
//!
//! ```ignore
//! let state = AppState::new(store.clone(), store.clone(), store, priv_manager, cipher);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, dbm_web::router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod nginx;
pub mod services;
pub mod state;

use axum::{
    Router,
    routing::{delete, get, post},
};
use handlers::{authorize, cloud, components, dirty, tickets};
use tower_http::trace::TraceLayer;

pub use crypto::{AccountCipher, CipherError, ExtensionAccount};
pub use error::AppError;
pub use extractors::{CorrelationId, OPERATOR_HEADER, Operator, ValidJson, ValidQuery};
pub use middleware::{CORRELATION_ID_HEADER, RequestContext, request_context_layer};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// The full application router.
pub fn router(state: AppState) -> Router {
    let db_dirty = Router::new()
        .route("/query_dirty_machines/", get(dirty::query_dirty_machines))
        .route("/delete_dirty_records/", delete(dirty::delete_dirty_records))
        .route("/transfer_hosts_to_pool/", post(dirty::transfer_hosts_to_pool))
        .route("/list_machine_events/", get(dirty::list_machine_events))
        .route("/query_machine_pool/", get(dirty::query_machine_pool));

    let cloud = Router::new()
        .route("/insert/", post(cloud::insert))
        .route("/pull_nginx_conf/", post(cloud::pull_nginx_conf));

    let tickets = Router::new()
        .route("/flow_types/", get(tickets::flow_types))
        .route("/build_flows/", post(tickets::build_flows));

    Router::new()
        .nest("/apis/db_dirty", db_dirty)
        .nest("/apis/proxypass/cloud", cloud)
        .nest("/apis/tickets", tickets)
        .route(
            "/apis/sqlserver/bizs/:bk_biz_id/permission/authorize/pre_check_rules/",
            post(authorize::pre_check_rules),
        )
        .route("/apis/flow/components/", get(components::list_components))
        .route("/apis/flow/components/:code/execute/", post(components::execute))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(request_context_layer())
}

//! DB management backend HTTP server.
//!
//! Serves the dirty pool, cloud proxy pass, authorize and ticket flow APIs
//! over `PostgreSQL` and the platform services.

mod config;
mod metrics;

use config::Config;
use dbm_clients::{DbConfigClient, DrsClient, PrivManagerClient};
use dbm_flow::ComponentLibrary;
use dbm_postgres::PgStore;
use dbm_web::{AccountCipher, AppState, router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the environment may be set directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbm_server=info,dbm_web=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DB management backend");

    let config = Config::from_env()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        dbconfig = %config.apis.dbconfig_url,
        dbpriv = %config.apis.dbpriv_url,
        drs = %config.apis.drs_url,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr =
        format!("{}:{}", config.server.metrics_host, config.server.metrics_port).parse()?;
    metrics::install(metrics_addr)?;

    let store = Arc::new(PgStore::connect_with(&config.postgres.url, &config.postgres.pool).await?);
    if config.postgres.run_migrations {
        store.migrate().await?;
    }

    let priv_manager = Arc::new(PrivManagerClient::new(config.apis.client(&config.apis.dbpriv_url))?);
    let dbconfig = Arc::new(DbConfigClient::new(config.apis.client(&config.apis.dbconfig_url))?);
    let drs = Arc::new(DrsClient::new(config.apis.client(&config.apis.drs_url))?);
    let cipher = AccountCipher::from_base64(&config.extension_cipher_key)?;

    let components = ComponentLibrary::with_defaults(store.clone(), drs, dbconfig, priv_manager.clone());
    info!(codes = ?components.codes(), "Flow components registered");

    let state = AppState::new(store.clone(), store.clone(), store, priv_manager, cipher)
        .with_components(components)
        .with_nginx_proxy_port(config.nginx_proxy_port);
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    let shutdown_timeout = config.server.shutdown_timeout;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::select! {
        result = server => result?,
        () = drain_deadline(shutdown_timeout) => {
            warn!(timeout = ?shutdown_timeout, "Graceful shutdown timed out");
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}

/// Resolves `timeout` after the first shutdown signal; never before.
async fn drain_deadline(timeout: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(timeout).await;
}

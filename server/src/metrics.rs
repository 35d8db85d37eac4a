//! Prometheus exporter for the business counters.

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the global recorder and serve `/metrics` on `addr`.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed or
/// the listener cannot bind.
pub fn install(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    tracing::info!(%addr, "Metrics server started - available at http://{}/metrics", addr);
    Ok(())
}

fn register_metrics() {
    describe_counter!("dirty_pool.deleted", "Dirty pool rows deleted");
    describe_counter!("dirty_pool.transferred", "Hosts moved between pools");
    describe_counter!("proxy.extension.inserted", "Cloud extensions registered");
    describe_counter!("proxy.nginx_conf.rendered", "Nginx sub-configurations rendered");
    describe_counter!("flow.component.executed", "Flow component executions by outcome");
    describe_counter!("clients.request", "External service requests by outcome");
}

//! Application state shared across all HTTP handlers.

use crate::crypto::AccountCipher;
use dbm_clients::PrivManagerApi;
use dbm_core::environment::{Clock, SystemClock};
use dbm_core::{DirtyPoolStore, MetaStore, ProxyStore};
use dbm_flow::{BuilderFactory, ComponentLibrary};
use std::sync::Arc;

/// Port the cloud nginx proxies listen on unless configured otherwise.
pub const DEFAULT_NGINX_PROXY_PORT: u16 = 80;

/// Stores, clients and settings used by the handlers.
///
/// # Examples
///
/// ```ignore
/// let store = Arc::new(PgStore::connect(&url, 10).await?);
/// let state = AppState::new(store.clone(), store.clone(), store, priv_manager, cipher)
///     .with_nginx_proxy_port(8080);
/// let app = dbm_web::router(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Pool hosts and machine events.
    pub dirty_pool: Arc<dyn DirtyPoolStore>,
    /// Tickets, businesses and clusters.
    pub meta: Arc<dyn MetaStore>,
    /// Cloud extensions and nginx proxies.
    pub proxy: Arc<dyn ProxyStore>,
    /// Password and account service.
    pub priv_manager: Arc<dyn PrivManagerApi>,
    /// Cipher for generated extension accounts.
    pub cipher: AccountCipher,
    /// Ticket flow builders.
    pub builders: BuilderFactory,
    /// Flow components callable by the pipeline engine.
    pub components: ComponentLibrary,
    /// Time source for audit records.
    pub clock: Arc<dyn Clock>,
    /// Listening port of the cloud nginx proxies.
    pub nginx_proxy_port: u16,
}

impl AppState {
    /// State with the default flow builders, no flow components, the system
    /// clock and the default nginx port.
    #[must_use]
    pub fn new(
        dirty_pool: Arc<dyn DirtyPoolStore>,
        meta: Arc<dyn MetaStore>,
        proxy: Arc<dyn ProxyStore>,
        priv_manager: Arc<dyn PrivManagerApi>,
        cipher: AccountCipher,
    ) -> Self {
        Self {
            builders: BuilderFactory::with_defaults(Arc::clone(&meta)),
            components: ComponentLibrary::new(),
            dirty_pool,
            meta,
            proxy,
            priv_manager,
            cipher,
            clock: Arc::new(SystemClock),
            nginx_proxy_port: DEFAULT_NGINX_PROXY_PORT,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the nginx port.
    #[must_use]
    pub fn with_nginx_proxy_port(mut self, port: u16) -> Self {
        self.nginx_proxy_port = port;
        self
    }

    /// Replace the flow components.
    #[must_use]
    pub fn with_components(mut self, components: ComponentLibrary) -> Self {
        self.components = components;
        self
    }

    /// Replace the flow builders.
    #[must_use]
    pub fn with_builders(mut self, builders: BuilderFactory) -> Self {
        self.builders = builders;
        self
    }
}

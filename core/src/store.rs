//! Storage abstractions.
//!
//! Three traits split persistence by the area that owns the rows:
//!
//! - [`DirtyPoolStore`]: pool hosts and their audit events
//! - [`MetaStore`]: read only metadata owned by other services (tickets,
//!   business cache, clusters)
//! - [`ProxyStore`]: per-cloud extensions, nginx proxies and published
//!   cluster services
//!
//! # Implementations
//!
//! - `PgStore` (in `dbm-postgres`): production
//! - `InMemoryStore` (in `dbm-testing`): tests
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of `async fn` so handlers can
//! hold the stores as `Arc<dyn DirtyPoolStore>` etc.

use crate::constants::PoolType;
use crate::filter::{DirtyMachineFilter, MachineEventFilter, MachinePoolFilter};
use crate::models::{
    AppCache, Cluster, ClusterExtension, DBCloudProxy, DBExtension, DirtyMachine, MachineEvent,
    NewDBExtension, NewMachineEvent, StorageInstance, Ticket,
};
use crate::pagination::{Page, Paged};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// Key that was looked up.
        id: String,
    },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rows changed underneath the operation; nothing was applied.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future returned by every store method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// A dirty machine joined with the ticket that left it in the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyMachineRow {
    /// The pool row.
    pub machine: DirtyMachine,
    /// The referenced ticket, when the host came from one.
    pub ticket: Option<Ticket>,
}

/// Pool hosts and their audit trail.
pub trait DirtyPoolStore: Send + Sync {
    /// Dirty machines matching `filter`, ordered by `ticket_id` descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn query_dirty_machines(
        &self,
        filter: DirtyMachineFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<DirtyMachineRow>>;

    /// Pool rows matching `filter`, ordered by `bk_host_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn query_machine_pool(
        &self,
        filter: MachinePoolFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<DirtyMachine>>;

    /// Pool rows for the given host ids (missing ids are skipped).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list_dirty_machines(&self, bk_host_ids: Vec<i64>) -> StoreFuture<'_, Vec<DirtyMachine>>;

    /// Delete pool rows by host id; returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    fn delete_dirty_machines(&self, bk_host_ids: Vec<i64>) -> StoreFuture<'_, u64>;

    /// Move hosts from `source` to `target` and append `events`, atomically.
    ///
    /// `target = None` removes the hosts from pool bookkeeping. Only rows
    /// still in `source` are touched.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] if any host is no longer in `source`
    /// - [`StoreError::Database`] if any statement fails
    ///
    /// Nothing is applied in either case.
    fn transfer_hosts(
        &self,
        bk_host_ids: Vec<i64>,
        source: PoolType,
        target: Option<PoolType>,
        events: Vec<NewMachineEvent>,
    ) -> StoreFuture<'_, ()>;

    /// Machine events matching `filter`, by id descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list_machine_events(
        &self,
        filter: MachineEventFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<MachineEvent>>;
}

/// Metadata owned by other services, read only here.
pub trait MetaStore: Send + Sync {
    /// Tickets by id (missing ids are skipped).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list_tickets(&self, ids: Vec<i64>) -> StoreFuture<'_, Vec<Ticket>>;

    /// Business cache entries by id (missing ids are skipped).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list_apps(&self, bk_biz_ids: Vec<i64>) -> StoreFuture<'_, Vec<AppCache>>;

    /// One cluster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the cluster does not exist.
    fn get_cluster(&self, id: i64) -> StoreFuture<'_, Cluster>;

    /// Clusters by id (missing ids are skipped).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list_clusters(&self, ids: Vec<i64>) -> StoreFuture<'_, Vec<Cluster>>;

    /// Storage instances of a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn storage_instances(&self, cluster_id: i64) -> StoreFuture<'_, Vec<StorageInstance>>;

    /// Cluster of a business by its access domain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn find_cluster_by_domain(
        &self,
        bk_biz_id: i64,
        domain: String,
    ) -> StoreFuture<'_, Option<Cluster>>;
}

/// Cloud region extensions and nginx publishing.
pub trait ProxyStore: Send + Sync {
    /// Persist an extension record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    fn insert_extension(&self, extension: NewDBExtension) -> StoreFuture<'_, DBExtension>;

    /// Persist a nginx proxy record for a cloud.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    fn create_cloud_proxy(
        &self,
        bk_cloud_id: i64,
        internal_address: String,
        external_address: String,
    ) -> StoreFuture<'_, DBCloudProxy>;

    /// Most recently registered nginx proxy of a cloud.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn last_cloud_proxy(&self, bk_cloud_id: i64) -> StoreFuture<'_, Option<DBCloudProxy>>;

    /// Published cluster services of a cloud.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list_cluster_extensions(&self, bk_cloud_id: i64)
    -> StoreFuture<'_, Vec<ClusterExtension>>;

    /// Record the URL a cluster service is reachable at.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the extension does not exist.
    fn save_access_url(&self, id: i64, access_url: String) -> StoreFuture<'_, ()>;
}

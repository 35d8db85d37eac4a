//! In-memory implementation of every store trait.

use dbm_core::filter::{DirtyMachineFilter, MachineEventFilter, MachinePoolFilter};
use dbm_core::models::{
    AppCache, Cluster, ClusterExtension, DBCloudProxy, DBExtension, DirtyMachine, MachineEvent,
    NewDBExtension, NewMachineEvent, StorageInstance, Ticket,
};
use dbm_core::store::DirtyMachineRow;
use dbm_core::{
    DirtyPoolStore, MetaStore, Page, Paged, PoolType, ProxyStore, StoreError, StoreFuture, Utc,
};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct State {
    machines: BTreeMap<i64, DirtyMachine>,
    events: Vec<MachineEvent>,
    tickets: BTreeMap<i64, Ticket>,
    apps: BTreeMap<i64, AppCache>,
    clusters: BTreeMap<i64, Cluster>,
    instances: Vec<StorageInstance>,
    extensions: Vec<DBExtension>,
    proxies: Vec<DBCloudProxy>,
    cluster_extensions: Vec<ClusterExtension>,
    fail_with: Option<String>,
}

/// Collection-backed store for fast, deterministic tests.
///
/// Implements [`DirtyPoolStore`], [`MetaStore`] and [`ProxyStore`] with the
/// same ordering and filtering rules as the `PostgreSQL` store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

#[allow(clippy::cast_possible_wrap)] // test collections stay tiny
fn count<T>(rows: &[T]) -> i64 {
    rows.len() as i64
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Database`].
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail_with = Some(message.into());
    }

    fn check(&self) -> Result<(), StoreError> {
        match &self.state.read().unwrap_or_else(PoisonError::into_inner).fail_with {
            Some(message) => Err(StoreError::Database(message.clone())),
            None => Ok(()),
        }
    }

    /// Seed a pool host.
    pub fn insert_machine(&self, machine: DirtyMachine) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .machines
            .insert(machine.bk_host_id, machine);
    }

    /// Seed a ticket.
    pub fn insert_ticket(&self, ticket: Ticket) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).tickets.insert(ticket.id, ticket);
    }

    /// Seed a business cache entry.
    pub fn insert_app(&self, app: AppCache) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).apps.insert(app.bk_biz_id, app);
    }

    /// Seed a cluster.
    pub fn insert_cluster(&self, cluster: Cluster) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).clusters.insert(cluster.id, cluster);
    }

    /// Seed a storage instance.
    pub fn insert_instance(&self, instance: StorageInstance) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).instances.push(instance);
    }

    /// Seed a published cluster service.
    pub fn insert_cluster_extension(&self, extension: ClusterExtension) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).cluster_extensions.push(extension);
    }

    /// Seed a machine event.
    pub fn insert_event(&self, event: MachineEvent) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).events.push(event);
    }

    /// Current pool hosts, by host id.
    #[must_use]
    pub fn machines(&self) -> Vec<DirtyMachine> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).machines.values().cloned().collect()
    }

    /// Every recorded machine event, in insertion order.
    #[must_use]
    pub fn events(&self) -> Vec<MachineEvent> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).events.clone()
    }

    /// Every saved extension.
    #[must_use]
    pub fn extensions(&self) -> Vec<DBExtension> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).extensions.clone()
    }

    /// Every saved cloud proxy.
    #[must_use]
    pub fn cloud_proxies(&self) -> Vec<DBCloudProxy> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).proxies.clone()
    }

    /// Every published cluster service.
    #[must_use]
    pub fn cluster_extensions(&self) -> Vec<ClusterExtension> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).cluster_extensions.clone()
    }
}

impl DirtyPoolStore for InMemoryStore {
    fn query_dirty_machines(
        &self,
        filter: DirtyMachineFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<DirtyMachineRow>> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let mut rows: Vec<DirtyMachineRow> = state
                .machines
                .values()
                .map(|machine| DirtyMachineRow {
                    ticket: machine.ticket_id.and_then(|id| state.tickets.get(&id).cloned()),
                    machine: machine.clone(),
                })
                .filter(|row| filter.matches(&row.machine, row.ticket.as_ref()))
                .collect();
            // ticket_id descending, hosts without ticket last
            rows.sort_by(|a, b| {
                b.machine
                    .ticket_id
                    .cmp(&a.machine.ticket_id)
                    .then(a.machine.bk_host_id.cmp(&b.machine.bk_host_id))
            });
            Ok(Paged {
                count: count(&rows),
                results: page.slice(&rows),
            })
        })
    }

    fn query_machine_pool(
        &self,
        filter: MachinePoolFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<DirtyMachine>> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let rows: Vec<DirtyMachine> = state
                .machines
                .values()
                .filter(|m| filter.matches(m))
                .cloned()
                .collect();
            Ok(Paged {
                count: count(&rows),
                results: page.slice(&rows),
            })
        })
    }

    fn list_dirty_machines(&self, bk_host_ids: Vec<i64>) -> StoreFuture<'_, Vec<DirtyMachine>> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            Ok(state
                .machines
                .values()
                .filter(|m| bk_host_ids.contains(&m.bk_host_id))
                .cloned()
                .collect())
        })
    }

    fn delete_dirty_machines(&self, bk_host_ids: Vec<i64>) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            self.check()?;
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let before = state.machines.len();
            state.machines.retain(|id, _| !bk_host_ids.contains(id));
            Ok((before - state.machines.len()) as u64)
        })
    }

    fn transfer_hosts(
        &self,
        bk_host_ids: Vec<i64>,
        source: PoolType,
        target: Option<PoolType>,
        events: Vec<NewMachineEvent>,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let moved = bk_host_ids
                .iter()
                .filter(|id| state.machines.get(id).is_some_and(|m| m.pool == source))
                .count();
            if moved != bk_host_ids.len() {
                return Err(StoreError::Conflict(format!(
                    "{} of {} hosts are no longer in the {source} pool",
                    bk_host_ids.len() - moved,
                    bk_host_ids.len()
                )));
            }
            match target {
                Some(pool) => {
                    for id in &bk_host_ids {
                        if let Some(machine) = state.machines.get_mut(id) {
                            machine.pool = pool;
                            machine.update_at = Utc::now();
                        }
                    }
                }
                None => state.machines.retain(|id, _| !bk_host_ids.contains(id)),
            }
            for event in events {
                let id = state.events.iter().map(|e| e.id).max().unwrap_or(0) + 1;
                state.events.push(MachineEvent {
                    id,
                    bk_biz_id: event.bk_biz_id,
                    bk_host_id: event.bk_host_id,
                    ip: event.ip,
                    event: event.event,
                    to: event.to,
                    ticket_id: event.ticket_id,
                    remark: event.remark,
                    creator: event.creator,
                    create_at: event.create_at,
                });
            }
            Ok(())
        })
    }

    fn list_machine_events(
        &self,
        filter: MachineEventFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<MachineEvent>> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let mut rows: Vec<MachineEvent> = state
                .events
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(Paged {
                count: count(&rows),
                results: page.slice(&rows),
            })
        })
    }
}

impl MetaStore for InMemoryStore {
    fn list_tickets(&self, ids: Vec<i64>) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            Ok(ids.iter().filter_map(|id| state.tickets.get(id).cloned()).collect())
        })
    }

    fn list_apps(&self, bk_biz_ids: Vec<i64>) -> StoreFuture<'_, Vec<AppCache>> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            Ok(bk_biz_ids
                .iter()
                .filter_map(|id| state.apps.get(id).cloned())
                .collect())
        })
    }

    fn get_cluster(&self, id: i64) -> StoreFuture<'_, Cluster> {
        Box::pin(async move {
            self.check()?;
            self.state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clusters
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("cluster", id))
        })
    }

    fn list_clusters(&self, ids: Vec<i64>) -> StoreFuture<'_, Vec<Cluster>> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            Ok(ids
                .iter()
                .filter_map(|id| state.clusters.get(id).cloned())
                .collect())
        })
    }

    fn storage_instances(&self, cluster_id: i64) -> StoreFuture<'_, Vec<StorageInstance>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .instances
                .iter()
                .filter(|i| i.cluster_id == cluster_id)
                .cloned()
                .collect())
        })
    }

    fn find_cluster_by_domain(
        &self,
        bk_biz_id: i64,
        domain: String,
    ) -> StoreFuture<'_, Option<Cluster>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clusters
                .values()
                .find(|c| c.bk_biz_id == bk_biz_id && c.immute_domain == domain)
                .cloned())
        })
    }
}

impl ProxyStore for InMemoryStore {
    fn insert_extension(&self, extension: NewDBExtension) -> StoreFuture<'_, DBExtension> {
        Box::pin(async move {
            self.check()?;
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let saved = DBExtension {
                id: count(&state.extensions) + 1,
                bk_cloud_id: extension.bk_cloud_id,
                extension: extension.extension,
                status: extension.status,
                details: extension.details,
                creator: extension.creator,
                create_at: Utc::now(),
            };
            state.extensions.push(saved.clone());
            Ok(saved)
        })
    }

    fn create_cloud_proxy(
        &self,
        bk_cloud_id: i64,
        internal_address: String,
        external_address: String,
    ) -> StoreFuture<'_, DBCloudProxy> {
        Box::pin(async move {
            self.check()?;
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let proxy = DBCloudProxy {
                id: count(&state.proxies) + 1,
                bk_cloud_id,
                internal_address,
                external_address,
            };
            state.proxies.push(proxy.clone());
            Ok(proxy)
        })
    }

    fn last_cloud_proxy(&self, bk_cloud_id: i64) -> StoreFuture<'_, Option<DBCloudProxy>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .proxies
                .iter()
                .filter(|p| p.bk_cloud_id == bk_cloud_id)
                .max_by_key(|p| p.id)
                .cloned())
        })
    }

    fn list_cluster_extensions(
        &self,
        bk_cloud_id: i64,
    ) -> StoreFuture<'_, Vec<ClusterExtension>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .cluster_extensions
                .iter()
                .filter(|e| e.bk_cloud_id == bk_cloud_id)
                .cloned()
                .collect())
        })
    }

    fn save_access_url(&self, id: i64, access_url: String) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let extension = state
                .cluster_extensions
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| StoreError::not_found("cluster extension", id))?;
            extension.access_url = Some(access_url);
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::fixtures;
    use dbm_core::{MachineEventType, TicketType};

    #[tokio::test]
    async fn dirty_machines_are_ordered_by_ticket_desc() {
        let store = InMemoryStore::new();
        store.insert_ticket(fixtures::ticket(5, TicketType::MysqlHaDestroy, "alice"));
        store.insert_machine(fixtures::machine_with_ticket(1, "1.1.1.1", PoolType::Dirty, 5));
        store.insert_machine(fixtures::machine_with_ticket(2, "2.2.2.2", PoolType::Dirty, 9));
        store.insert_machine(fixtures::machine(3, "3.3.3.3", PoolType::Dirty));

        let page = store
            .query_dirty_machines(DirtyMachineFilter::default(), Page::default())
            .await
            .unwrap();

        let ids: Vec<_> = page.results.iter().map(|r| r.machine.bk_host_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!(page.results[1].ticket.is_some());
        assert!(page.results[0].ticket.is_none());
    }

    #[tokio::test]
    async fn transfer_to_none_removes_rows_and_records_events() {
        let store = InMemoryStore::new();
        store.insert_machine(fixtures::machine(1, "1.1.1.1", PoolType::Recycle));

        store
            .transfer_hosts(
                vec![1],
                PoolType::Recycle,
                None,
                vec![fixtures::new_event(1, "1.1.1.1", MachineEventType::Recycled)],
            )
            .await
            .unwrap();

        assert!(store.machines().is_empty());
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.events()[0].id, 1);
    }

    #[tokio::test]
    async fn transfer_of_hosts_outside_source_is_a_conflict() {
        let store = InMemoryStore::new();
        store.insert_machine(fixtures::machine(1, "1.1.1.1", PoolType::Dirty));
        store.insert_machine(fixtures::machine(2, "2.2.2.2", PoolType::Fault));

        let err = store
            .transfer_hosts(
                vec![1, 2],
                PoolType::Dirty,
                Some(PoolType::Fault),
                vec![fixtures::new_event(1, "1.1.1.1", MachineEventType::ToFault)],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.machines()[0].pool, PoolType::Dirty);
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn fail_with_breaks_every_call() {
        let store = InMemoryStore::new();
        store.fail_with("connection refused");
        let err = store.list_tickets(vec![1]).await.unwrap_err();
        assert_eq!(err, StoreError::Database("connection refused".into()));
    }
}

//! Dirty pool operations behind the `db_dirty` endpoints.

use crate::error::AppError;
use crate::state::AppState;
use dbm_core::filter::{DirtyMachineFilter, MachineEventFilter, MachinePoolFilter};
use dbm_core::models::{AppCache, MachineEvent, NewMachineEvent};
use dbm_core::{Page, Paged, PoolType, TicketType};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A dirty pool row enriched with its business and ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirtyMachineRecord {
    /// Host id.
    pub bk_host_id: i64,
    /// Host IP.
    pub ip: String,
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Business.
    pub bk_biz_id: i64,
    /// Business name, empty when the business is not cached.
    pub bk_biz_name: String,
    /// Ticket that left the host here.
    pub ticket_id: Option<i64>,
    /// Type of that ticket.
    pub ticket_type: Option<TicketType>,
    /// Label of that type.
    pub ticket_type_display: String,
    /// Flow that left the host here.
    pub task_id: Option<String>,
    /// Ticket creator.
    pub operator: String,
    /// Current pool.
    pub pool: PoolType,
    /// Whether the host is still in the dirty pool.
    pub is_dirty: bool,
}

/// A machine event with business and cluster context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineEventRecord {
    /// The event.
    #[serde(flatten)]
    pub event: MachineEvent,
    /// Business name.
    pub bk_biz_name: String,
    /// Business abbreviation.
    pub db_app_abbr: String,
    /// Clusters of the referenced ticket.
    pub clusters: Vec<Value>,
}

/// Input of [`DirtyMachineService::transfer_hosts_to_pool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Hosts to move.
    pub bk_host_ids: Vec<i64>,
    /// Pool the hosts are in.
    pub source: PoolType,
    /// Pool to move them to.
    pub target: PoolType,
    /// Audit remark.
    pub remark: String,
}

/// Dirty pool queries and transitions.
#[derive(Clone)]
pub struct DirtyMachineService {
    state: AppState,
}

impl DirtyMachineService {
    /// Service over the application state.
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    async fn apps(&self, bk_biz_ids: impl IntoIterator<Item = i64>) -> Result<HashMap<i64, AppCache>, AppError> {
        let ids: BTreeSet<i64> = bk_biz_ids.into_iter().collect();
        Ok(self
            .state
            .meta
            .list_apps(ids.into_iter().collect())
            .await?
            .into_iter()
            .map(|app| (app.bk_biz_id, app))
            .collect())
    }

    /// Dirty machines, newest ticket first, with business and ticket data.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn query_dirty_machines(
        &self,
        filter: DirtyMachineFilter,
        page: Page,
    ) -> Result<Paged<DirtyMachineRecord>, AppError> {
        let rows = self.state.dirty_pool.query_dirty_machines(filter, page).await?;
        let apps = self.apps(rows.results.iter().map(|r| r.machine.bk_biz_id)).await?;

        Ok(rows.map(|row| {
            let machine = row.machine;
            let ticket = row.ticket;
            DirtyMachineRecord {
                bk_biz_name: apps
                    .get(&machine.bk_biz_id)
                    .map(|a| a.bk_biz_name.clone())
                    .unwrap_or_default(),
                ticket_type: ticket.as_ref().map(|t| t.ticket_type),
                ticket_type_display: ticket
                    .as_ref()
                    .map(|t| t.ticket_type.label().to_string())
                    .unwrap_or_default(),
                operator: ticket.map(|t| t.creator).unwrap_or_default(),
                is_dirty: machine.pool == PoolType::Dirty,
                bk_host_id: machine.bk_host_id,
                ip: machine.ip,
                bk_cloud_id: machine.bk_cloud_id,
                bk_biz_id: machine.bk_biz_id,
                ticket_id: machine.ticket_id,
                task_id: machine.task_id,
                pool: machine.pool,
            }
        }))
    }

    /// Delete pool rows, returning how many were removed. An empty id list
    /// deletes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store delete fails.
    pub async fn delete_dirty_records(&self, bk_host_ids: Vec<i64>) -> Result<u64, AppError> {
        if bk_host_ids.is_empty() {
            return Ok(0);
        }
        let deleted = self.state.dirty_pool.delete_dirty_machines(bk_host_ids).await?;
        metrics::counter!("dirty_pool.deleted").increment(deleted);
        tracing::info!(deleted, "Dirty records deleted");
        Ok(deleted)
    }

    /// Move hosts from `source` to `target`, appending one event per host.
    ///
    /// Moving into `recycled` drops the hosts from the pool. An empty id list
    /// moves nothing.
    ///
    /// # Errors
    ///
    /// - [`AppError::bad_request`] for an unsupported transition or hosts
    ///   that are not in `source`
    /// - a `409` when a host leaves `source` while the transfer runs
    /// - a store error if the transfer fails
    pub async fn transfer_hosts_to_pool(&self, operator: &str, request: TransferRequest) -> Result<(), AppError> {
        let TransferRequest {
            bk_host_ids,
            source,
            target,
            remark,
        } = request;
        if !source.can_transfer_to(target) {
            return Err(AppError::bad_request(format!(
                "hosts cannot move from {source} to {target}"
            )));
        }
        if bk_host_ids.is_empty() {
            return Ok(());
        }

        let machines: Vec<_> = self
            .state
            .dirty_pool
            .list_dirty_machines(bk_host_ids.clone())
            .await?
            .into_iter()
            .filter(|m| m.pool == source)
            .collect();
        let outside: Vec<String> = bk_host_ids
            .iter()
            .filter(|id| !machines.iter().any(|m| m.bk_host_id == **id))
            .map(ToString::to_string)
            .collect();
        if !outside.is_empty() {
            return Err(AppError::bad_request(format!(
                "hosts [{}] are not in the {source} pool",
                outside.join(", ")
            )));
        }

        let now = self.state.clock.now();
        let mut by_biz: BTreeMap<i64, Vec<NewMachineEvent>> = BTreeMap::new();
        for machine in &machines {
            by_biz.entry(machine.bk_biz_id).or_default().push(NewMachineEvent {
                bk_biz_id: machine.bk_biz_id,
                bk_host_id: machine.bk_host_id,
                ip: machine.ip.clone(),
                event: target.arrival_event(),
                to: Some(target),
                ticket_id: None,
                remark: remark.clone(),
                creator: operator.to_string(),
                create_at: now,
            });
        }
        let events: Vec<NewMachineEvent> = by_biz.into_values().flatten().collect();

        let destination = (target != PoolType::Recycled).then_some(target);
        self.state
            .dirty_pool
            .transfer_hosts(
                machines.iter().map(|m| m.bk_host_id).collect(),
                source,
                destination,
                events,
            )
            .await?;

        metrics::counter!("dirty_pool.transferred", "target" => target.as_str())
            .increment(machines.len() as u64);
        tracing::info!(
            operator,
            %source,
            %target,
            hosts = machines.len(),
            "Hosts transferred"
        );
        Ok(())
    }

    /// Machine events with business names and ticket clusters.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query fails.
    pub async fn list_machine_events(
        &self,
        filter: MachineEventFilter,
        page: Page,
    ) -> Result<Paged<MachineEventRecord>, AppError> {
        let events = self.state.dirty_pool.list_machine_events(filter, page).await?;
        let apps = self.apps(events.results.iter().map(|e| e.bk_biz_id)).await?;

        let ticket_ids: BTreeSet<i64> = events.results.iter().filter_map(|e| e.ticket_id).collect();
        let tickets: HashMap<i64, Vec<Value>> = self
            .state
            .meta
            .list_tickets(ticket_ids.into_iter().collect())
            .await?
            .into_iter()
            .map(|t| (t.id, t.cluster_values()))
            .collect();

        Ok(events.map(|event| {
            let app = apps.get(&event.bk_biz_id);
            MachineEventRecord {
                bk_biz_name: app.map(|a| a.bk_biz_name.clone()).unwrap_or_default(),
                db_app_abbr: app.map(|a| a.db_app_abbr.clone()).unwrap_or_default(),
                clusters: event
                    .ticket_id
                    .and_then(|id| tickets.get(&id).cloned())
                    .unwrap_or_default(),
                event,
            }
        }))
    }

    /// Pool rows matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn query_machine_pool(
        &self,
        filter: MachinePoolFilter,
        page: Page,
    ) -> Result<Paged<dbm_core::models::DirtyMachine>, AppError> {
        Ok(self.state.dirty_pool.query_machine_pool(filter, page).await?)
    }
}

//! Dirty pool endpoints under `/apis/db_dirty/`.

use crate::WebResult;
use crate::extractors::{Operator, ValidJson, ValidQuery};
use crate::services::dirty::{DirtyMachineRecord, DirtyMachineService, MachineEventRecord, TransferRequest};
use crate::state::AppState;
use axum::{Json, extract::State};
use dbm_core::filter::{DirtyMachineFilter, MachineEventFilter, MachinePoolFilter, split_ips};
use dbm_core::models::DirtyMachine;
use dbm_core::{MachineEventType, Page, Paged, PoolType, TicketType};
use serde::Deserialize;
use serde_json::{Value, json};

fn non_empty(list: Vec<String>) -> Option<Vec<String>> {
    (!list.is_empty()).then_some(list)
}

/// Query of `query_dirty_machines`.
#[derive(Debug, Default, Deserialize)]
pub struct DirtyMachineQuery {
    /// Comma separated host IPs.
    pub ip_list: Option<String>,
    /// Ticket id.
    pub ticket_id: Option<i64>,
    /// Flow root id.
    pub task_id: Option<String>,
    /// Ticket type.
    pub ticket_type: Option<TicketType>,
    /// Ticket creator.
    pub operator: Option<String>,
    /// Page size.
    pub limit: Option<i64>,
    /// Rows to skip.
    pub offset: Option<i64>,
}

impl DirtyMachineQuery {
    fn into_parts(self) -> (DirtyMachineFilter, Page) {
        let filter = DirtyMachineFilter {
            ip_list: self.ip_list.as_deref().map(split_ips).and_then(non_empty),
            ticket_id: self.ticket_id,
            task_id: self.task_id.filter(|t| !t.is_empty()),
            ticket_type: self.ticket_type,
            operator: self.operator.filter(|o| !o.is_empty()),
        };
        (filter, Page::new(self.limit, self.offset))
    }
}

/// Query of `list_machine_events`.
#[derive(Debug, Default, Deserialize)]
pub struct MachineEventQuery {
    /// Comma separated host IPs.
    pub ips: Option<String>,
    /// Business.
    pub bk_biz_id: Option<i64>,
    /// Event kind.
    pub event: Option<MachineEventType>,
    /// Operator.
    pub operator: Option<String>,
    /// Page size.
    pub limit: Option<i64>,
    /// Rows to skip.
    pub offset: Option<i64>,
}

/// Query of `query_machine_pool`.
#[derive(Debug, Default, Deserialize)]
pub struct MachinePoolQuery {
    /// Pool.
    pub pool: Option<PoolType>,
    /// Comma separated host IPs.
    pub ips: Option<String>,
    /// Business.
    pub bk_biz_id: Option<i64>,
    /// City.
    pub city: Option<String>,
    /// Availability zone.
    pub sub_zone: Option<String>,
    /// Device class.
    pub device_class: Option<String>,
    /// OS name substring.
    pub os_name: Option<String>,
    /// Page size.
    pub limit: Option<i64>,
    /// Rows to skip.
    pub offset: Option<i64>,
}

/// Body of `delete_dirty_records`.
#[derive(Debug, Deserialize)]
pub struct DeleteDirtyRecords {
    /// Hosts to delete.
    pub bk_host_ids: Vec<i64>,
}

/// Body of `transfer_hosts_to_pool`.
#[derive(Debug, Deserialize)]
pub struct TransferHosts {
    /// Hosts to move.
    pub bk_host_ids: Vec<i64>,
    /// Current pool.
    pub source: PoolType,
    /// Destination pool.
    pub target: PoolType,
    /// Audit remark.
    #[serde(default)]
    pub remark: String,
}

/// `GET /apis/db_dirty/query_dirty_machines/`
///
/// # Errors
///
/// Returns 400 for malformed query values, 500 on storage errors.
pub async fn query_dirty_machines(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<DirtyMachineQuery>,
) -> WebResult<Json<Paged<DirtyMachineRecord>>> {
    let (filter, page) = query.into_parts();
    let page = DirtyMachineService::new(state).query_dirty_machines(filter, page).await?;
    Ok(Json(page))
}

/// `DELETE /apis/db_dirty/delete_dirty_records/`
///
/// # Errors
///
/// Returns 400 for a missing id list; an empty list deletes nothing.
pub async fn delete_dirty_records(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<DeleteDirtyRecords>,
) -> WebResult<Json<Value>> {
    DirtyMachineService::new(state)
        .delete_dirty_records(body.bk_host_ids)
        .await?;
    Ok(Json(json!({})))
}

/// `POST /apis/db_dirty/transfer_hosts_to_pool/`
///
/// # Errors
///
/// Returns 400 for unsupported transitions or hosts outside `source`.
pub async fn transfer_hosts_to_pool(
    State(state): State<AppState>,
    Operator(operator): Operator,
    ValidJson(body): ValidJson<TransferHosts>,
) -> WebResult<Json<Value>> {
    DirtyMachineService::new(state)
        .transfer_hosts_to_pool(
            &operator,
            TransferRequest {
                bk_host_ids: body.bk_host_ids,
                source: body.source,
                target: body.target,
                remark: body.remark,
            },
        )
        .await?;
    Ok(Json(json!({})))
}

/// `GET /apis/db_dirty/list_machine_events/`
///
/// # Errors
///
/// Returns 400 for malformed query values, 500 on storage errors.
pub async fn list_machine_events(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<MachineEventQuery>,
) -> WebResult<Json<Paged<MachineEventRecord>>> {
    let filter = MachineEventFilter {
        ips: query.ips.as_deref().map(split_ips).and_then(non_empty),
        bk_biz_id: query.bk_biz_id,
        event: query.event,
        operator: query.operator.filter(|o| !o.is_empty()),
    };
    let page = DirtyMachineService::new(state)
        .list_machine_events(filter, Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(page))
}

/// `GET /apis/db_dirty/query_machine_pool/`
///
/// # Errors
///
/// Returns 400 for malformed query values, 500 on storage errors.
pub async fn query_machine_pool(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<MachinePoolQuery>,
) -> WebResult<Json<Paged<DirtyMachine>>> {
    let filter = MachinePoolFilter {
        pool: query.pool,
        ips: query.ips.as_deref().map(split_ips).and_then(non_empty),
        bk_biz_id: query.bk_biz_id,
        city: query.city,
        sub_zone: query.sub_zone,
        device_class: query.device_class,
        os_name: query.os_name,
    };
    let page = DirtyMachineService::new(state)
        .query_machine_pool(filter, Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_query_drops_blank_filters() {
        let query = DirtyMachineQuery {
            ip_list: Some(" , ".to_string()),
            task_id: Some(String::new()),
            operator: Some("admin".to_string()),
            limit: Some(5000),
            ..DirtyMachineQuery::default()
        };
        let (filter, page) = query.into_parts();

        assert_eq!(filter.ip_list, None);
        assert_eq!(filter.task_id, None);
        assert_eq!(filter.operator.as_deref(), Some("admin"));
        assert_eq!(page.limit, dbm_core::pagination::MAX_LIMIT);
    }

    #[test]
    fn test_dirty_query_splits_ips() {
        let query = DirtyMachineQuery {
            ip_list: Some("1.1.1.1,2.2.2.2".to_string()),
            ..DirtyMachineQuery::default()
        };
        let (filter, page) = query.into_parts();

        assert_eq!(
            filter.ip_list,
            Some(vec!["1.1.1.1".to_string(), "2.2.2.2".to_string()])
        );
        assert_eq!(page, Page::default());
    }
}

//! `SQLServer` decommission.

use super::common::validate_take_down;
use super::{BuilderFuture, SceneRef, TicketFlowBuilder};
use dbm_core::models::Ticket;
use dbm_core::{ClusterType, FlowRetryType, MetaStore, TicketType};
use serde_json::Value;
use std::sync::Arc;

/// Builds the flows of a `SQLSERVER_DESTROY` ticket. Failed nodes wait for
/// a manual retry.
pub struct SqlserverDestroyFlowBuilder {
    meta: Arc<dyn MetaStore>,
}

impl SqlserverDestroyFlowBuilder {
    /// Builder validating against `meta`.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaStore>) -> Self {
        Self { meta }
    }
}

impl TicketFlowBuilder for SqlserverDestroyFlowBuilder {
    fn ticket_type(&self) -> TicketType {
        TicketType::SqlserverDestroy
    }

    fn inner_flow_name(&self) -> &'static str {
        "SQLServer 销毁执行"
    }

    fn scene(&self) -> SceneRef {
        SceneRef::new("SqlserverController", "cluster_destroy_scene")
    }

    fn retry_type(&self) -> FlowRetryType {
        FlowRetryType::ManualRetry
    }

    fn need_patch_recycle_cluster_details(&self) -> bool {
        true
    }

    fn validate_details<'a>(&'a self, ticket: &'a Ticket) -> BuilderFuture<'a, Value> {
        Box::pin(async move { validate_take_down(self.meta.as_ref(), ticket, ClusterType::is_sqlserver).await })
    }
}

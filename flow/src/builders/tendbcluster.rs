//! TenDB cluster decommission.

use super::common::validate_take_down;
use super::{BuilderFuture, SceneRef, TicketFlowBuilder};
use dbm_core::models::Ticket;
use dbm_core::{ClusterType, MetaStore, TicketType};
use serde_json::Value;
use std::sync::Arc;

/// Builds the flows of a `TENDBCLUSTER_DESTROY` ticket.
pub struct TendbDestroyFlowBuilder {
    meta: Arc<dyn MetaStore>,
}

impl TendbDestroyFlowBuilder {
    /// Builder validating against `meta`.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaStore>) -> Self {
        Self { meta }
    }
}

impl TicketFlowBuilder for TendbDestroyFlowBuilder {
    fn ticket_type(&self) -> TicketType {
        TicketType::TendbclusterDestroy
    }

    fn inner_flow_name(&self) -> &'static str {
        "TenDB Cluster 下架执行"
    }

    fn scene(&self) -> SceneRef {
        SceneRef::new("SpiderController", "spider_cluster_destroy_scene")
    }

    fn need_patch_recycle_cluster_details(&self) -> bool {
        true
    }

    fn validate_details<'a>(&'a self, ticket: &'a Ticket) -> BuilderFuture<'a, Value> {
        Box::pin(async move {
            validate_take_down(self.meta.as_ref(), ticket, |t| *t == ClusterType::Tendbcluster).await
        })
    }
}

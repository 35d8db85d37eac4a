//! Kafka node replacement.

use super::bigdata::{BigDataReplaceDetails, IpSource};
use super::common::parse_details;
use super::{BuilderFuture, ResourceParamBuilder, SceneRef, TicketFlowBuilder};
use crate::error::BuilderError;
use dbm_core::models::Ticket;
use dbm_core::{ClusterType, MetaStore, TicketType};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;

/// Kafka node roles.
pub const KAFKA_ROLES: &[&str] = &["broker", "zookeeper"];

/// Builds the flows of a `KAFKA_REPLACE` ticket.
pub struct KafkaReplaceFlowBuilder {
    meta: Arc<dyn MetaStore>,
    resource: KafkaReplaceResourceParamBuilder,
}

impl KafkaReplaceFlowBuilder {
    /// Builder validating against `meta`.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaStore>) -> Self {
        Self {
            meta,
            resource: KafkaReplaceResourceParamBuilder,
        }
    }

    async fn validate(&self, ticket: &Ticket) -> Result<Value, BuilderError> {
        let details: BigDataReplaceDetails = parse_details(&ticket.details)?;
        details.check_counts(KAFKA_ROLES)?;

        let cluster = self.meta.get_cluster(details.cluster_id).await?;
        if cluster.cluster_type != ClusterType::Kafka {
            return Err(BuilderError::invalid(format!(
                "cluster {} is {}, not kafka",
                cluster.immute_domain, cluster.cluster_type
            )));
        }
        if cluster.bk_biz_id != ticket.bk_biz_id {
            return Err(BuilderError::invalid(format!(
                "cluster {} does not belong to business {}",
                cluster.immute_domain, ticket.bk_biz_id
            )));
        }

        let cluster_hosts: HashSet<i64> = self
            .meta
            .storage_instances(cluster.id)
            .await?
            .into_iter()
            .map(|i| i.bk_host_id)
            .collect();
        let strangers: Vec<&str> = details
            .old_hosts()
            .filter(|h| !cluster_hosts.contains(&h.bk_host_id))
            .map(|h| h.ip.as_str())
            .collect();
        if !strangers.is_empty() {
            return Err(BuilderError::invalid(format!(
                "hosts [{}] are not part of cluster {}",
                strangers.join(", "),
                cluster.immute_domain
            )));
        }

        let mut normalised = ticket.details.clone();
        if let Value::Object(map) = &mut normalised {
            map.insert("ip_recycle".to_string(), json!(details.ip_recycle));
            map.insert("bk_cloud_id".to_string(), json!(cluster.bk_cloud_id));
        }
        Ok(normalised)
    }
}

impl TicketFlowBuilder for KafkaReplaceFlowBuilder {
    fn ticket_type(&self) -> TicketType {
        TicketType::KafkaReplace
    }

    fn inner_flow_name(&self) -> &'static str {
        "Kafka 集群替换"
    }

    fn scene(&self) -> SceneRef {
        SceneRef::new("KafkaController", "kafka_replace_scene")
    }

    fn validate_details<'a>(&'a self, ticket: &'a Ticket) -> BuilderFuture<'a, Value> {
        Box::pin(self.validate(ticket))
    }

    fn resource_param_builder(&self) -> Option<&dyn ResourceParamBuilder> {
        Some(&self.resource)
    }

    fn recycle_hosts(&self, details: &Value) -> Vec<Value> {
        details
            .get("old_nodes")
            .and_then(Value::as_object)
            .map(|roles| {
                roles
                    .values()
                    .filter_map(Value::as_array)
                    .flatten()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Resource pool request of a Kafka replacement, one group per role.
#[derive(Debug, Clone, Copy, Default)]
pub struct KafkaReplaceResourceParamBuilder;

impl ResourceParamBuilder for KafkaReplaceResourceParamBuilder {
    fn build(&self, ticket: &Ticket) -> Result<Value, BuilderError> {
        let details: BigDataReplaceDetails = parse_details(&ticket.details)?;
        if details.ip_source != IpSource::ResourcePool {
            return Err(BuilderError::invalid("resource apply needs ip_source resource_pool"));
        }
        let groups: Vec<Value> = details
            .resource_spec
            .iter()
            .filter(|(_, spec)| spec.count > 0)
            .map(|(role, spec)| {
                json!({
                    "group_mark": role,
                    "spec_id": spec.spec_id,
                    "count": spec.count,
                })
            })
            .collect();
        Ok(json!({
            "bk_biz_id": ticket.bk_biz_id,
            "bk_cloud_id": ticket.details.get("bk_cloud_id").cloned().unwrap_or(json!(0)),
            "for_biz_id": ticket.bk_biz_id,
            "details": groups,
        }))
    }

    fn post_callback(&self, details: &mut Value, applied: &Value) -> Result<(), BuilderError> {
        let requested: Vec<String> = parse_details::<BigDataReplaceDetails>(details)?
            .resource_spec
            .into_iter()
            .filter(|(_, spec)| spec.count > 0)
            .map(|(role, _)| role)
            .collect();
        let nodes = applied
            .get("nodes")
            .and_then(Value::as_object)
            .ok_or_else(|| BuilderError::invalid("applied resource has no nodes"))?;

        let mut new_nodes = serde_json::Map::new();
        for role in requested {
            let hosts = nodes
                .get(&role)
                .cloned()
                .ok_or_else(|| BuilderError::invalid(format!("no hosts applied for role {role}")))?;
            new_nodes.insert(role, hosts);
        }
        if let Value::Object(map) = details {
            map.insert("new_nodes".to_string(), Value::Object(new_nodes));
        }
        Ok(())
    }
}

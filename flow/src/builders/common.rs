//! Validation shared by cluster take-down builders.

use super::HostRecycleDetails;
use crate::error::BuilderError;
use dbm_core::models::Ticket;
use dbm_core::{ClusterType, MetaStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Details of a ticket that takes clusters down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeDownDetails {
    /// Clusters to take down.
    pub cluster_ids: Vec<i64>,
    /// Destination of the released hosts.
    #[serde(default)]
    pub ip_recycle: HostRecycleDetails,
}

/// Decode ticket details into `T`, mapping serde errors to validation errors.
pub(crate) fn parse_details<T: serde::de::DeserializeOwned>(details: &Value) -> Result<T, BuilderError> {
    serde_json::from_value(details.clone()).map_err(|e| BuilderError::invalid(format!("invalid details: {e}")))
}

/// Check that every cluster of a take-down ticket exists, belongs to the
/// ticket's business and has an accepted architecture.
///
/// Returns the details with `ip_recycle` normalised.
pub(crate) async fn validate_take_down(
    meta: &dyn MetaStore,
    ticket: &Ticket,
    accepts: fn(&ClusterType) -> bool,
) -> Result<Value, BuilderError> {
    let details: TakeDownDetails = parse_details(&ticket.details)?;
    if details.cluster_ids.is_empty() {
        return Err(BuilderError::invalid("cluster_ids must not be empty"));
    }

    let clusters = meta.list_clusters(details.cluster_ids.clone()).await?;
    let missing: Vec<String> = details
        .cluster_ids
        .iter()
        .filter(|id| !clusters.iter().any(|c| c.id == **id))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(BuilderError::invalid(format!(
            "clusters [{}] do not exist",
            missing.join(", ")
        )));
    }

    for cluster in &clusters {
        if cluster.bk_biz_id != ticket.bk_biz_id {
            return Err(BuilderError::invalid(format!(
                "cluster {} does not belong to business {}",
                cluster.immute_domain, ticket.bk_biz_id
            )));
        }
        if !accepts(&cluster.cluster_type) {
            return Err(BuilderError::invalid(format!(
                "cluster {} is {}, not handled by {}",
                cluster.immute_domain, cluster.cluster_type, ticket.ticket_type
            )));
        }
    }

    let mut normalised = ticket.details.clone();
    if let Value::Object(map) = &mut normalised {
        map.insert(
            "ip_recycle".to_string(),
            serde_json::to_value(details.ip_recycle)
                .map_err(|e| BuilderError::invalid(e.to_string()))?,
        );
    }
    Ok(normalised)
}

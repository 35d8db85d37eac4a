//! Node replacement details shared by the big data components.

use super::HostRecycleDetails;
use crate::error::BuilderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the replacement hosts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpSource {
    /// Applied from the resource pool by a resource apply flow.
    ResourcePool,
    /// Supplied in the ticket.
    ManualInput,
}

impl IpSource {
    /// Wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ResourcePool => "resource_pool",
            Self::ManualInput => "manual_input",
        }
    }
}

/// A host as it appears in ticket details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Host IP.
    pub ip: String,
    /// CMDB host id.
    pub bk_host_id: i64,
    /// Cloud region.
    #[serde(default)]
    pub bk_cloud_id: i64,
    /// Business the host belongs to.
    #[serde(default)]
    pub bk_biz_id: i64,
}

/// Requested hosts of one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Machine spec.
    pub spec_id: i64,
    /// Number of hosts.
    pub count: usize,
}

/// Details of a big data node replacement ticket, keyed by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigDataReplaceDetails {
    /// Cluster being changed.
    pub cluster_id: i64,
    /// Source of the new hosts.
    pub ip_source: IpSource,
    /// Hosts leaving the cluster.
    pub old_nodes: BTreeMap<String, Vec<HostInfo>>,
    /// Hosts joining the cluster.
    #[serde(default)]
    pub new_nodes: BTreeMap<String, Vec<HostInfo>>,
    /// Resource pool request.
    #[serde(default)]
    pub resource_spec: BTreeMap<String, ResourceSpec>,
    /// Destination of the old hosts.
    #[serde(default)]
    pub ip_recycle: HostRecycleDetails,
}

impl BigDataReplaceDetails {
    /// Number of old hosts of `role`.
    #[must_use]
    pub fn old_count(&self, role: &str) -> usize {
        self.old_nodes.get(role).map_or(0, Vec::len)
    }

    /// Every old host, role by role.
    pub fn old_hosts(&self) -> impl Iterator<Item = &HostInfo> {
        self.old_nodes.values().flatten()
    }

    /// Check roles and counts.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Validation`] if a role is not in `roles`, no
    /// old host is given, or the replacement does not match the old hosts
    /// role by role.
    pub fn check_counts(&self, roles: &[&str]) -> Result<(), BuilderError> {
        let unknown: Vec<&str> = self
            .old_nodes
            .keys()
            .chain(self.new_nodes.keys())
            .chain(self.resource_spec.keys())
            .map(String::as_str)
            .filter(|role| !roles.contains(role))
            .collect();
        if !unknown.is_empty() {
            return Err(BuilderError::invalid(format!(
                "unsupported roles: {}",
                unknown.join(", ")
            )));
        }
        if self.old_hosts().next().is_none() {
            return Err(BuilderError::invalid("old_nodes must not be empty"));
        }

        for role in roles {
            let old = self.old_count(role);
            let new = match self.ip_source {
                IpSource::ManualInput => self.new_nodes.get(*role).map_or(0, Vec::len),
                IpSource::ResourcePool => self.resource_spec.get(*role).map_or(0, |s| s.count),
            };
            if old != new {
                return Err(BuilderError::invalid(format!(
                    "role {role} replaces {old} hosts with {new} ({})",
                    self.ip_source.as_str()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use serde_json::json;

    const ROLES: &[&str] = &["broker", "zookeeper"];

    fn details(value: serde_json::Value) -> BigDataReplaceDetails {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn manual_input_counts_must_match() {
        let d = details(json!({
            "cluster_id": 1,
            "ip_source": "manual_input",
            "old_nodes": {"broker": [{"ip": "1.1.1.1", "bk_host_id": 1}]},
            "new_nodes": {"broker": []},
        }));
        let err = d.check_counts(ROLES).unwrap_err();
        assert_eq!(
            err,
            BuilderError::invalid("role broker replaces 1 hosts with 0 (manual_input)")
        );
    }

    #[test]
    fn resource_pool_counts_come_from_spec() {
        let d = details(json!({
            "cluster_id": 1,
            "ip_source": "resource_pool",
            "old_nodes": {"broker": [{"ip": "1.1.1.1", "bk_host_id": 1}]},
            "resource_spec": {"broker": {"spec_id": 3, "count": 1}},
        }));
        d.check_counts(ROLES).unwrap();
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let d = details(json!({
            "cluster_id": 1,
            "ip_source": "manual_input",
            "old_nodes": {"proxy": [{"ip": "1.1.1.1", "bk_host_id": 1}]},
        }));
        assert_eq!(d.check_counts(ROLES).unwrap_err(), BuilderError::invalid("unsupported roles: proxy"));
    }
}

//! Persisted records.

use crate::constants::{
    ClusterPhase, ClusterType, ExtensionServiceStatus, ExtensionType, MachineEventType, PoolType,
    TicketType,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A host tracked by the dirty / fault / recycle pools, keyed by `bk_host_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirtyMachine {
    /// CMDB host id.
    pub bk_host_id: i64,
    /// Business the host was last used by.
    pub bk_biz_id: i64,
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Inner IP.
    pub ip: String,
    /// City / region name.
    pub city: String,
    /// Availability zone.
    pub sub_zone: String,
    /// Rack.
    pub rack_id: String,
    /// Device class (hardware model).
    pub device_class: String,
    /// OS name.
    pub os_name: String,
    /// CPU cores.
    pub bk_cpu: i32,
    /// Memory in MB.
    pub bk_mem: i64,
    /// Disk in GB.
    pub bk_disk: i64,
    /// Ticket that left the host here.
    pub ticket_id: Option<i64>,
    /// Flow (task) root id that left the host here.
    pub task_id: Option<String>,
    /// Current pool.
    pub pool: PoolType,
    /// Who put the host here.
    pub creator: String,
    /// Created at.
    pub create_at: DateTime<Utc>,
    /// Last update.
    pub update_at: DateTime<Utc>,
}

/// Audit record of a host transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineEvent {
    /// Row id.
    pub id: i64,
    /// Business the host belonged to.
    pub bk_biz_id: i64,
    /// CMDB host id.
    pub bk_host_id: i64,
    /// Inner IP.
    pub ip: String,
    /// Transition kind.
    pub event: MachineEventType,
    /// Pool the host ended up in, if any.
    pub to: Option<PoolType>,
    /// Related ticket.
    pub ticket_id: Option<i64>,
    /// Free form remark.
    pub remark: String,
    /// Operator.
    pub creator: String,
    /// When it happened.
    pub create_at: DateTime<Utc>,
}

/// A machine event that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMachineEvent {
    /// Business the host belonged to.
    pub bk_biz_id: i64,
    /// CMDB host id.
    pub bk_host_id: i64,
    /// Inner IP.
    pub ip: String,
    /// Transition kind.
    pub event: MachineEventType,
    /// Pool the host ended up in, if any.
    pub to: Option<PoolType>,
    /// Related ticket.
    pub ticket_id: Option<i64>,
    /// Free form remark.
    pub remark: String,
    /// Operator.
    pub creator: String,
    /// When it happened.
    pub create_at: DateTime<Utc>,
}

/// A user submitted change request. Owned by the ticket service; read only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket id.
    pub id: i64,
    /// Kind.
    pub ticket_type: TicketType,
    /// Submitter.
    pub creator: String,
    /// Business.
    pub bk_biz_id: i64,
    /// Status as reported by the ticket service.
    pub status: String,
    /// Type specific payload.
    pub details: Value,
}

impl Ticket {
    /// Values of `details.clusters`, or an empty list.
    #[must_use]
    pub fn cluster_values(&self) -> Vec<Value> {
        match self.details.get("clusters") {
            Some(Value::Object(map)) => map.values().cloned().collect(),
            Some(Value::Array(list)) => list.clone(),
            _ => Vec::new(),
        }
    }
}

/// Cached business metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCache {
    /// Business id.
    pub bk_biz_id: i64,
    /// Business name.
    pub bk_biz_name: String,
    /// Business abbreviation used in domains.
    pub db_app_abbr: String,
}

/// A deployed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster id.
    pub id: i64,
    /// Business.
    pub bk_biz_id: i64,
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Cluster name.
    pub name: String,
    /// Immutable access domain.
    pub immute_domain: String,
    /// Architecture.
    pub cluster_type: ClusterType,
    /// Lifecycle phase.
    pub phase: ClusterPhase,
    /// Major version string.
    pub major_version: String,
}

/// One storage instance of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInstance {
    /// Instance id.
    pub id: i64,
    /// Owning cluster.
    pub cluster_id: i64,
    /// Host the instance runs on.
    pub bk_host_id: i64,
    /// Host IP.
    pub ip: String,
    /// Listening port.
    pub port: i32,
    /// Role inside the cluster (master, slave, broker, ...).
    pub instance_role: String,
}

impl StorageInstance {
    /// `ip:port`.
    #[must_use]
    pub fn ip_port(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// A registered per-cloud auxiliary service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DBExtension {
    /// Row id.
    pub id: i64,
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Service kind.
    pub extension: ExtensionType,
    /// Running state.
    pub status: ExtensionServiceStatus,
    /// Service specific details (addresses, encrypted credentials).
    pub details: Value,
    /// Registered by.
    pub creator: String,
    /// Registered at.
    pub create_at: DateTime<Utc>,
}

/// An extension that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDBExtension {
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Service kind.
    pub extension: ExtensionType,
    /// Running state.
    pub status: ExtensionServiceStatus,
    /// Service specific details.
    pub details: Value,
    /// Registered by.
    pub creator: String,
}

/// Nginx proxy of a cloud region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBCloudProxy {
    /// Row id.
    pub id: i64,
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Address reachable from inside the region.
    pub internal_address: String,
    /// Address reachable from the platform.
    pub external_address: String,
}

/// A cluster web service published through the cloud's nginx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterExtension {
    /// Row id.
    pub id: i64,
    /// Business.
    pub bk_biz_id: i64,
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Cluster id.
    pub cluster_id: i64,
    /// Cluster name.
    pub cluster_name: String,
    /// Cluster db type (`es`, `hdfs`, ...).
    pub db_type: String,
    /// Published service (`es_head`, `hdfs_web`, ...).
    pub service_type: String,
    /// Upstream IP.
    pub ip: String,
    /// Upstream port.
    pub port: i32,
    /// URL once published.
    pub access_url: Option<String>,
}

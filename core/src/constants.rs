//! Enumerations shared by every layer of the backend.
//!
//! All enums serialize to the same string values the HTTP API and the
//! database use, so a value read from a query string, a JSON body or a
//! table column goes through the same `FromStr` / serde path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string does not name a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{value}\" is not a valid {kind}")]
pub struct UnknownVariant {
    /// The enum that was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal, $label:literal; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire / database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }

            /// Human readable label.
            #[must_use]
            pub const fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Pools a host can sit in after leaving service.
    PoolType: "pool type" {
        /// Left behind by a failed or finished flow, not yet triaged.
        Dirty => "dirty", "污点池";
        /// Suspected hardware or system fault.
        Fault => "fault", "故障池";
        /// Waiting to be returned to the CMDB idle module.
        Recycle => "recycle", "待回收池";
        /// Returned; the host leaves pool bookkeeping.
        Recycled => "recycled", "已回收";
    }
}

impl PoolType {
    /// Event recorded when a host lands in this pool.
    #[must_use]
    pub const fn arrival_event(&self) -> MachineEventType {
        match self {
            Self::Dirty => MachineEventType::ToDirty,
            Self::Fault => MachineEventType::ToFault,
            Self::Recycle => MachineEventType::ToRecycle,
            Self::Recycled => MachineEventType::Recycled,
        }
    }

    /// Whether hosts may be moved from `self` straight into `target`.
    #[must_use]
    pub const fn can_transfer_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Dirty, Self::Fault | Self::Recycle)
                | (Self::Fault, Self::Recycle)
                | (Self::Recycle, Self::Recycled)
        )
    }
}

string_enum! {
    /// Audit event kinds recorded against a host.
    MachineEventType: "machine event type" {
        /// Host moved to the dirty pool.
        ToDirty => "to_dirty", "主机转入污点池";
        /// Host moved to the fault pool.
        ToFault => "to_fault", "主机转入故障池";
        /// Host moved to the recycle pool.
        ToRecycle => "to_recycle", "主机转入待回收池";
        /// Host returned to the CMDB.
        Recycled => "recycled", "主机回收";
        /// Host imported into the resource pool.
        ImportResource => "import_resource", "导入资源池";
        /// Host applied from the resource pool.
        ApplyResource => "apply_resource", "申请资源";
        /// Host returned to the resource pool.
        ReturnResource => "return_resource", "退回资源池";
        /// Resource import undone.
        UndoImport => "undo_import", "撤销导入";
    }
}

string_enum! {
    /// Ticket kinds known to the platform.
    TicketType: "ticket type" {
        /// `MySQL` single-node deployment.
        MysqlSingleApply => "MYSQL_SINGLE_APPLY", "MySQL 单节点部署";
        /// `MySQL` HA deployment.
        MysqlHaApply => "MYSQL_HA_APPLY", "MySQL 高可用部署";
        /// `MySQL` HA decommission.
        MysqlHaDestroy => "MYSQL_HA_DESTROY", "MySQL 高可用删除";
        /// `TenDB` Cluster deployment.
        TendbclusterApply => "TENDBCLUSTER_APPLY", "TenDB Cluster 集群部署";
        /// `TenDB` Cluster decommission.
        TendbclusterDestroy => "TENDBCLUSTER_DESTROY", "TenDB Cluster 集群删除";
        /// `SQLServer` single-node deployment.
        SqlserverSingleApply => "SQLSERVER_SINGLE_APPLY", "SQLServer 单节点部署";
        /// `SQLServer` HA deployment.
        SqlserverHaApply => "SQLSERVER_HA_APPLY", "SQLServer 主从部署";
        /// `SQLServer` cluster decommission.
        SqlserverDestroy => "SQLSERVER_DESTROY", "SQLServer 集群删除";
        /// Kafka deployment.
        KafkaApply => "KAFKA_APPLY", "Kafka 集群部署";
        /// Kafka scale up.
        KafkaScaleUp => "KAFKA_SCALE_UP", "Kafka 集群扩容";
        /// Kafka shrink.
        KafkaShrink => "KAFKA_SHRINK", "Kafka 集群缩容";
        /// Kafka node replacement.
        KafkaReplace => "KAFKA_REPLACE", "Kafka 集群替换";
        /// Kafka decommission.
        KafkaDestroy => "KAFKA_DESTROY", "Kafka 集群删除";
        /// Resource pool import.
        ResourceImport => "RESOURCE_IMPORT", "资源池导入";
    }
}

string_enum! {
    /// Auxiliary services registered per cloud region.
    ExtensionType: "extension type" {
        /// Reverse proxy in front of web consoles.
        Nginx => "NGINX", "Nginx";
        /// DB remote service.
        Drs => "DRS", "DRS";
        /// DB high availability agent.
        Dbha => "DBHA", "DBHA";
        /// Redis data transfer service.
        RedisDts => "REDIS_DTS", "Redis DTS";
    }
}

string_enum! {
    /// Running state of a registered extension.
    ExtensionServiceStatus: "extension service status" {
        /// Serving.
        Running => "RUNNING", "运行中";
        /// Not serving.
        Unavailable => "UNAVAILABLE", "不可用";
    }
}

string_enum! {
    /// Lifecycle phase of a cluster.
    ClusterPhase: "cluster phase" {
        /// Serving traffic.
        Online => "online", "正常";
        /// Disabled, still deployed.
        Offline => "offline", "禁用";
        /// Being decommissioned.
        Destroy => "destroy", "删除中";
    }
}

impl ClusterPhase {
    /// Whether a ticket may move a cluster from `self` to `target`.
    #[must_use]
    pub const fn can_transfer_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Online, Self::Offline)
                | (Self::Offline, Self::Online | Self::Destroy)
        )
    }
}

string_enum! {
    /// How the flow engine retries a failed inner flow.
    FlowRetryType: "flow retry type" {
        /// Engine retries on its own.
        AutoRetry => "AUTO_RETRY", "自动重试";
        /// An operator must retry by hand.
        ManualRetry => "MANUAL_RETRY", "手动重试";
    }
}

string_enum! {
    /// Cluster architectures referenced by this service.
    ClusterType: "cluster type" {
        /// Spider based distributed `MySQL`.
        Tendbcluster => "tendbcluster", "TenDB Cluster";
        /// Standalone `SQLServer`.
        SqlserverSingle => "sqlserver_single", "SQLServer 单节点";
        /// `SQLServer` with replicas.
        SqlserverHa => "sqlserver_ha", "SQLServer 主从";
        /// Kafka.
        Kafka => "kafka", "Kafka";
        /// Elasticsearch.
        Es => "es", "ES";
        /// HDFS.
        Hdfs => "hdfs", "HDFS";
        /// Pulsar.
        Pulsar => "pulsar", "Pulsar";
        /// `InfluxDB`.
        Influxdb => "influxdb", "InfluxDB";
        /// Redis.
        Redis => "redis", "Redis";
    }
}

impl ClusterType {
    /// Whether this is one of the `SQLServer` architectures.
    #[must_use]
    pub const fn is_sqlserver(&self) -> bool {
        matches!(self, Self::SqlserverSingle | Self::SqlserverHa)
    }
}

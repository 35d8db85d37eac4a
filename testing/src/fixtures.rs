//! Fixture builders with sensible defaults.

use dbm_core::models::{
    AppCache, Cluster, ClusterExtension, DirtyMachine, NewMachineEvent, StorageInstance, Ticket,
};
use dbm_core::{ClusterPhase, ClusterType, MachineEventType, PoolType, TicketType};
use serde_json::json;

use crate::test_clock;
use dbm_core::environment::Clock;

/// Business used by every fixture.
pub const BIZ: i64 = 3;

/// A pool host in business [`BIZ`], cloud 0.
#[must_use]
pub fn machine(bk_host_id: i64, ip: &str, pool: PoolType) -> DirtyMachine {
    let now = test_clock().now();
    DirtyMachine {
        bk_host_id,
        bk_biz_id: BIZ,
        bk_cloud_id: 0,
        ip: ip.to_string(),
        city: "shenzhen".to_string(),
        sub_zone: "sz-1".to_string(),
        rack_id: "r1".to_string(),
        device_class: "S5.LARGE8".to_string(),
        os_name: "tlinux 2.2".to_string(),
        bk_cpu: 4,
        bk_mem: 8192,
        bk_disk: 100,
        ticket_id: None,
        task_id: None,
        pool,
        creator: "admin".to_string(),
        create_at: now,
        update_at: now,
    }
}

/// A pool host left by `ticket_id`.
#[must_use]
pub fn machine_with_ticket(bk_host_id: i64, ip: &str, pool: PoolType, ticket_id: i64) -> DirtyMachine {
    DirtyMachine {
        ticket_id: Some(ticket_id),
        task_id: Some(format!("task-{ticket_id}")),
        ..machine(bk_host_id, ip, pool)
    }
}

/// A ticket in business [`BIZ`] referencing cluster 1.
#[must_use]
pub fn ticket(id: i64, ticket_type: TicketType, creator: &str) -> Ticket {
    Ticket {
        id,
        ticket_type,
        creator: creator.to_string(),
        bk_biz_id: BIZ,
        status: "SUCCEEDED".to_string(),
        details: json!({
            "clusters": {
                "1": {"id": 1, "name": "cluster01", "immute_domain": "cluster01.db"}
            }
        }),
    }
}

/// Business cache entry for [`BIZ`].
#[must_use]
pub fn app() -> AppCache {
    AppCache {
        bk_biz_id: BIZ,
        bk_biz_name: "DBA".to_string(),
        db_app_abbr: "dba".to_string(),
    }
}

/// An online cluster in business [`BIZ`].
#[must_use]
pub fn cluster(id: i64, cluster_type: ClusterType, domain: &str) -> Cluster {
    Cluster {
        id,
        bk_biz_id: BIZ,
        bk_cloud_id: 0,
        name: domain.split('.').next().unwrap_or(domain).to_string(),
        immute_domain: domain.to_string(),
        cluster_type,
        phase: ClusterPhase::Online,
        major_version: String::new(),
    }
}

/// A storage instance of `cluster_id`.
#[must_use]
pub fn instance(id: i64, cluster_id: i64, bk_host_id: i64, ip: &str, port: i32, role: &str) -> StorageInstance {
    StorageInstance {
        id,
        cluster_id,
        bk_host_id,
        ip: ip.to_string(),
        port,
        instance_role: role.to_string(),
    }
}

/// A published cluster service without access URL.
#[must_use]
pub fn cluster_extension(id: i64, bk_cloud_id: i64, db_type: &str, service_type: &str) -> ClusterExtension {
    ClusterExtension {
        id,
        bk_biz_id: BIZ,
        bk_cloud_id,
        cluster_id: id,
        cluster_name: format!("{db_type}{id:02}"),
        db_type: db_type.to_string(),
        service_type: service_type.to_string(),
        ip: format!("10.0.0.{id}"),
        port: 9200,
        access_url: None,
    }
}

/// An unsaved machine event by `admin`.
#[must_use]
pub fn new_event(bk_host_id: i64, ip: &str, event: MachineEventType) -> NewMachineEvent {
    NewMachineEvent {
        bk_biz_id: BIZ,
        bk_host_id,
        ip: ip.to_string(),
        event,
        to: None,
        ticket_id: None,
        remark: String::new(),
        creator: "admin".to_string(),
        create_at: test_clock().now(),
    }
}

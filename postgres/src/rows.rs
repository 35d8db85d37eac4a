//! Row to model conversion.

use dbm_core::models::{
    AppCache, Cluster, ClusterExtension, DBCloudProxy, DBExtension, DirtyMachine, MachineEvent,
    StorageInstance, Ticket,
};
use dbm_core::StoreError;
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::str::FromStr;

fn parse<T>(raw: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) const DIRTY_MACHINE_COLUMNS: &str = "m.bk_host_id, m.bk_biz_id, m.bk_cloud_id, m.ip, \
     m.city, m.sub_zone, m.rack_id, m.device_class, m.os_name, m.bk_cpu, m.bk_mem, m.bk_disk, \
     m.ticket_id, m.task_id, m.pool, m.creator, m.create_at, m.update_at";

pub(crate) fn dirty_machine(row: &PgRow) -> Result<DirtyMachine, StoreError> {
    let pool: String = row.get("pool");
    Ok(DirtyMachine {
        bk_host_id: row.get("bk_host_id"),
        bk_biz_id: row.get("bk_biz_id"),
        bk_cloud_id: row.get("bk_cloud_id"),
        ip: row.get("ip"),
        city: row.get("city"),
        sub_zone: row.get("sub_zone"),
        rack_id: row.get("rack_id"),
        device_class: row.get("device_class"),
        os_name: row.get("os_name"),
        bk_cpu: row.get("bk_cpu"),
        bk_mem: row.get("bk_mem"),
        bk_disk: row.get("bk_disk"),
        ticket_id: row.get("ticket_id"),
        task_id: row.get("task_id"),
        pool: parse(&pool)?,
        creator: row.get("creator"),
        create_at: row.get("create_at"),
        update_at: row.get("update_at"),
    })
}

/// Ticket columns of the dirty machine join, aliased with a `t_` prefix.
pub(crate) fn joined_ticket(row: &PgRow) -> Result<Option<Ticket>, StoreError> {
    let Some(id) = row.get::<Option<i64>, _>("t_id") else {
        return Ok(None);
    };
    let ticket_type: String = row.get("t_ticket_type");
    Ok(Some(Ticket {
        id,
        ticket_type: parse(&ticket_type)?,
        creator: row.get("t_creator"),
        bk_biz_id: row.get("t_bk_biz_id"),
        status: row.get("t_status"),
        details: row.get("t_details"),
    }))
}

pub(crate) fn machine_event(row: &PgRow) -> Result<MachineEvent, StoreError> {
    let event: String = row.get("event");
    let to: Option<String> = row.get("to_pool");
    Ok(MachineEvent {
        id: row.get("id"),
        bk_biz_id: row.get("bk_biz_id"),
        bk_host_id: row.get("bk_host_id"),
        ip: row.get("ip"),
        event: parse(&event)?,
        to: to.as_deref().map(parse).transpose()?,
        ticket_id: row.get("ticket_id"),
        remark: row.get("remark"),
        creator: row.get("creator"),
        create_at: row.get("create_at"),
    })
}

pub(crate) fn ticket(row: &PgRow) -> Result<Ticket, StoreError> {
    let ticket_type: String = row.get("ticket_type");
    Ok(Ticket {
        id: row.get("id"),
        ticket_type: parse(&ticket_type)?,
        creator: row.get("creator"),
        bk_biz_id: row.get("bk_biz_id"),
        status: row.get("status"),
        details: row.get("details"),
    })
}

pub(crate) fn app_cache(row: &PgRow) -> AppCache {
    AppCache {
        bk_biz_id: row.get("bk_biz_id"),
        bk_biz_name: row.get("bk_biz_name"),
        db_app_abbr: row.get("db_app_abbr"),
    }
}

pub(crate) fn cluster(row: &PgRow) -> Result<Cluster, StoreError> {
    let cluster_type: String = row.get("cluster_type");
    let phase: String = row.get("phase");
    Ok(Cluster {
        id: row.get("id"),
        bk_biz_id: row.get("bk_biz_id"),
        bk_cloud_id: row.get("bk_cloud_id"),
        name: row.get("name"),
        immute_domain: row.get("immute_domain"),
        cluster_type: parse(&cluster_type)?,
        phase: parse(&phase)?,
        major_version: row.get("major_version"),
    })
}

pub(crate) fn storage_instance(row: &PgRow) -> StorageInstance {
    StorageInstance {
        id: row.get("id"),
        cluster_id: row.get("cluster_id"),
        bk_host_id: row.get("bk_host_id"),
        ip: row.get("ip"),
        port: row.get("port"),
        instance_role: row.get("instance_role"),
    }
}

pub(crate) fn extension(row: &PgRow) -> Result<DBExtension, StoreError> {
    let extension: String = row.get("extension");
    let status: String = row.get("status");
    Ok(DBExtension {
        id: row.get("id"),
        bk_cloud_id: row.get("bk_cloud_id"),
        extension: parse(&extension)?,
        status: parse(&status)?,
        details: row.get("details"),
        creator: row.get("creator"),
        create_at: row.get("create_at"),
    })
}

pub(crate) fn cloud_proxy(row: &PgRow) -> DBCloudProxy {
    DBCloudProxy {
        id: row.get("id"),
        bk_cloud_id: row.get("bk_cloud_id"),
        internal_address: row.get("internal_address"),
        external_address: row.get("external_address"),
    }
}

pub(crate) fn cluster_extension(row: &PgRow) -> ClusterExtension {
    ClusterExtension {
        id: row.get("id"),
        bk_biz_id: row.get("bk_biz_id"),
        bk_cloud_id: row.get("bk_cloud_id"),
        cluster_id: row.get("cluster_id"),
        cluster_name: row.get("cluster_name"),
        db_type: row.get("db_type"),
        service_type: row.get("service_type"),
        ip: row.get("ip"),
        port: row.get("port"),
        access_url: row.get("access_url"),
    }
}

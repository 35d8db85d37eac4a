//! Router tests for the dirty pool endpoints.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

mod common;

use axum::http::StatusCode;
use common::{OPERATOR, operator_header, spawn};
use dbm_core::models::MachineEvent;
use dbm_core::{MachineEventType, PoolType, TicketType};
use dbm_testing::{InMemoryStore, MockPrivManagerApi, fixtures, test_clock};
use dbm_core::environment::Clock;
use serde_json::{Value, json};

fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.insert_app(fixtures::app());
    store.insert_ticket(fixtures::ticket(11, TicketType::TendbclusterDestroy, "alice"));
    store.insert_machine(fixtures::machine_with_ticket(1, "1.1.1.1", PoolType::Dirty, 11));
    store.insert_machine(fixtures::machine(2, "2.2.2.2", PoolType::Dirty));
    store.insert_machine(fixtures::machine(3, "3.3.3.3", PoolType::Fault));
    store
}

#[tokio::test]
async fn test_query_dirty_machines_enriches_rows() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());

    let response = app.server.get("/apis/db_dirty/query_dirty_machines/").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 3);
    let first = &body["results"][0];
    assert_eq!(first["bk_host_id"], 1);
    assert_eq!(first["ticket_id"], 11);
    assert_eq!(first["ticket_type"], "TENDBCLUSTER_DESTROY");
    assert_eq!(first["ticket_type_display"], "TenDB Cluster 集群删除");
    assert_eq!(first["operator"], "alice");
    assert_eq!(first["bk_biz_name"], "DBA");
    assert_eq!(first["is_dirty"], true);
    assert_eq!(body["results"][2]["is_dirty"], false);
    assert_eq!(body["results"][1]["ticket_id"], Value::Null);
}

#[tokio::test]
async fn test_query_dirty_machines_filters_and_paginates() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());

    let response = app
        .server
        .get("/apis/db_dirty/query_dirty_machines/")
        .add_query_param("ip_list", "1.1.1.1,2.2.2.2")
        .add_query_param("limit", 1)
        .add_query_param("offset", 1)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["ip"], "2.2.2.2");
}

#[tokio::test]
async fn test_query_dirty_machines_rejects_unknown_ticket_type() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());

    let response = app
        .server
        .get("/apis/db_dirty/query_dirty_machines/")
        .add_query_param("ticket_type", "NOT_A_TICKET")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_delete_dirty_records() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());

    let response = app
        .server
        .delete("/apis/db_dirty/delete_dirty_records/")
        .json(&json!({"bk_host_ids": [1, 2, 99]}))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({}));
    let left: Vec<i64> = app.store.machines().iter().map(|m| m.bk_host_id).collect();
    assert_eq!(left, vec![3]);
}

#[tokio::test]
async fn test_delete_requires_host_ids() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());

    let response = app
        .server
        .delete("/apis/db_dirty/delete_dirty_records/")
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.machines().len(), 3);
}

#[tokio::test]
async fn test_empty_host_lists_are_no_ops() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());
    let (name, value) = operator_header();

    let response = app
        .server
        .delete("/apis/db_dirty/delete_dirty_records/")
        .json(&json!({"bk_host_ids": []}))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({}));

    let response = app
        .server
        .post("/apis/db_dirty/transfer_hosts_to_pool/")
        .add_header(name, value)
        .json(&json!({"bk_host_ids": [], "source": "dirty", "target": "fault"}))
        .await;
    response.assert_status_ok();

    assert_eq!(app.store.machines().len(), 3);
    assert!(app.store.events().is_empty());
}

#[tokio::test]
async fn test_transfer_dirty_to_fault_records_events() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());
    let (name, value) = operator_header();

    let response = app
        .server
        .post("/apis/db_dirty/transfer_hosts_to_pool/")
        .add_header(name, value)
        .json(&json!({
            "bk_host_ids": [1, 2],
            "source": "dirty",
            "target": "fault",
            "remark": "disk broken"
        }))
        .await;

    response.assert_status_ok();
    assert!(app.store.machines()[..2].iter().all(|m| m.pool == PoolType::Fault));

    let events = app.store.events();
    assert_eq!(events.len(), 2);
    for event in &events {
        assert_eq!(event.event, MachineEventType::ToFault);
        assert_eq!(event.to, Some(PoolType::Fault));
        assert_eq!(event.creator, OPERATOR);
        assert_eq!(event.remark, "disk broken");
        assert_eq!(event.create_at, test_clock().now());
    }
}

#[tokio::test]
async fn test_transfer_to_recycled_removes_hosts() {
    let store = InMemoryStore::new();
    store.insert_machine(fixtures::machine(5, "5.5.5.5", PoolType::Recycle));
    let app = spawn(store, MockPrivManagerApi::new());
    let (name, value) = operator_header();

    let response = app
        .server
        .post("/apis/db_dirty/transfer_hosts_to_pool/")
        .add_header(name, value)
        .json(&json!({"bk_host_ids": [5], "source": "recycle", "target": "recycled"}))
        .await;

    response.assert_status_ok();
    assert!(app.store.machines().is_empty());
    let events = app.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, MachineEventType::Recycled);
}

#[tokio::test]
async fn test_transfer_rejects_unsupported_transition() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());
    let (name, value) = operator_header();

    let response = app
        .server
        .post("/apis/db_dirty/transfer_hosts_to_pool/")
        .add_header(name, value)
        .json(&json!({"bk_host_ids": [1], "source": "dirty", "target": "recycled"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(app.store.events().is_empty());
}

#[tokio::test]
async fn test_transfer_lists_hosts_outside_source_pool() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());
    let (name, value) = operator_header();

    let response = app
        .server
        .post("/apis/db_dirty/transfer_hosts_to_pool/")
        .add_header(name, value)
        .json(&json!({"bk_host_ids": [1, 3, 42], "source": "dirty", "target": "recycle"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "hosts [3, 42] are not in the dirty pool");
    assert_eq!(app.store.machines()[0].pool, PoolType::Dirty);
}

#[tokio::test]
async fn test_transfer_requires_operator() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());

    let response = app
        .server
        .post("/apis/db_dirty/transfer_hosts_to_pool/")
        .json(&json!({"bk_host_ids": [1], "source": "dirty", "target": "fault"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_machine_events_adds_business_and_clusters() {
    let store = seeded_store();
    store.insert_event(MachineEvent {
        id: 1,
        bk_biz_id: fixtures::BIZ,
        bk_host_id: 1,
        ip: "1.1.1.1".to_string(),
        event: MachineEventType::ToDirty,
        to: Some(PoolType::Dirty),
        ticket_id: Some(11),
        remark: String::new(),
        creator: "alice".to_string(),
        create_at: test_clock().now(),
    });
    store.insert_event(MachineEvent {
        id: 2,
        bk_biz_id: fixtures::BIZ,
        bk_host_id: 2,
        ip: "2.2.2.2".to_string(),
        event: MachineEventType::ToFault,
        to: Some(PoolType::Fault),
        ticket_id: None,
        remark: String::new(),
        creator: OPERATOR.to_string(),
        create_at: test_clock().now(),
    });
    let app = spawn(store, MockPrivManagerApi::new());

    let response = app.server.get("/apis/db_dirty/list_machine_events/").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["id"], 2);
    assert_eq!(body["results"][0]["clusters"], json!([]));
    assert_eq!(body["results"][1]["db_app_abbr"], "dba");
    assert_eq!(body["results"][1]["bk_biz_name"], "DBA");
    assert_eq!(body["results"][1]["clusters"][0]["immute_domain"], "cluster01.db");

    let response = app
        .server
        .get("/apis/db_dirty/list_machine_events/")
        .add_query_param("event", "to_fault")
        .await;
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_query_machine_pool_by_pool() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());

    let response = app
        .server
        .get("/apis/db_dirty/query_machine_pool/")
        .add_query_param("pool", "fault")
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["ip"], "3.3.3.3");
    assert_eq!(body["results"][0]["device_class"], "S5.LARGE8");
}

#[tokio::test]
async fn test_query_machine_pool_splits_ips_on_newlines() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());

    let response = app
        .server
        .get("/apis/db_dirty/query_machine_pool/")
        .add_query_param("ips", "1.1.1.1\n2.2.2.2")
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    let ips: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ip"].as_str().unwrap())
        .collect();
    assert_eq!(ips, vec!["1.1.1.1", "2.2.2.2"]);
}

#[tokio::test]
async fn test_store_failure_is_internal_error() {
    let app = spawn(seeded_store(), MockPrivManagerApi::new());
    app.store.fail_with("connection reset");

    let response = app.server.get("/apis/db_dirty/query_machine_pool/").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["message"], "Storage error");
}

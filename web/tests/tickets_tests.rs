//! Router tests for ticket flow planning.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

mod common;

use axum::http::StatusCode;
use common::{operator_header, spawn, spawn_with};
use dbm_flow::BuilderFactory;
use dbm_core::{ClusterPhase, ClusterType};
use dbm_testing::{InMemoryStore, MockPrivManagerApi, fixtures};
use serde_json::{Value, json};
use std::sync::Arc;

#[tokio::test]
async fn test_flow_types_lists_default_builders() {
    let app = spawn(InMemoryStore::new(), MockPrivManagerApi::new());

    let response = app.server.get("/apis/tickets/flow_types/").await;

    response.assert_status_ok();
    let body: Vec<Value> = response.json();
    let types: Vec<&str> = body.iter().map(|r| r["ticket_type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["KAFKA_REPLACE", "SQLSERVER_DESTROY", "TENDBCLUSTER_DESTROY"]);
}

#[tokio::test]
async fn test_build_flows_for_tendb_destroy() {
    let store = InMemoryStore::new();
    let mut cluster = fixtures::cluster(1, ClusterType::Tendbcluster, "spider01.db");
    cluster.phase = ClusterPhase::Offline;
    store.insert_cluster(cluster);
    store.insert_instance(fixtures::instance(1, 1, 100, "1.1.1.1", 3306, "spider_master"));
    store.insert_instance(fixtures::instance(2, 1, 101, "1.1.1.2", 20000, "remote_master"));
    let app = spawn(store, MockPrivManagerApi::new());
    let (name, value) = operator_header();

    let response = app
        .server
        .post("/apis/tickets/build_flows/")
        .add_header(name, value)
        .json(&json!({
            "id": 7,
            "ticket_type": "TENDBCLUSTER_DESTROY",
            "bk_biz_id": fixtures::BIZ,
            "details": {"cluster_ids": [1]}
        }))
        .await;

    response.assert_status_ok();
    let plan: Value = response.json();
    let flows = plan["flows"].as_array().unwrap();
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0]["flow_type"], "INNER_FLOW");
    assert_eq!(flows[0]["scene"], "SpiderController.spider_cluster_destroy_scene");
    assert_eq!(flows[0]["flow_data"]["created_by"], "admin");
    assert_eq!(flows[1]["flow_type"], "HOST_RECYCLE");
    assert_eq!(flows[1]["hosts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_build_flows_rejects_online_cluster() {
    let store = InMemoryStore::new();
    store.insert_cluster(fixtures::cluster(1, ClusterType::Tendbcluster, "spider01.db"));
    let app = spawn(store, MockPrivManagerApi::new());
    let (name, value) = operator_header();

    let response = app
        .server
        .post("/apis/tickets/build_flows/")
        .add_header(name, value)
        .json(&json!({
            "ticket_type": "TENDBCLUSTER_DESTROY",
            "bk_biz_id": fixtures::BIZ,
            "details": {"cluster_ids": [1]}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_build_flows_unregistered_type() {
    let app = spawn(InMemoryStore::new(), MockPrivManagerApi::new());
    let (name, value) = operator_header();

    let response = app
        .server
        .post("/apis/tickets/build_flows/")
        .add_header(name, value)
        .json(&json!({"ticket_type": "KAFKA_APPLY", "bk_biz_id": 3, "details": {}}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_flow_types_with_custom_factory() {
    let store = InMemoryStore::new();
    let meta = Arc::new(store.clone());
    let app = spawn_with(store, MockPrivManagerApi::new(), |state| {
        state.with_builders(BuilderFactory::new(meta))
    });

    let response = app.server.get("/apis/tickets/flow_types/").await;

    response.assert_status_ok();
    let body: Vec<Value> = response.json();
    assert!(body.is_empty());
}

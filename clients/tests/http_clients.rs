//! HTTP client tests against a wiremock server.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use dbm_clients::dbconfig::{
    ConfFileInfo, ConfItem, FormatType, LevelName, OpType, QueryConfItemRequest, ReqType,
    UpsertConfItemRequest,
};
use dbm_clients::drs::SqlserverRpcRequest;
use dbm_clients::priv_manager::{
    ComponentUser, ListAccountRulesRequest, ModifyPasswordRequest, PasswordInstance,
};
use dbm_clients::{
    ApiError, ClientConfig, DbConfigApi, DbConfigClient, DrsApi, DrsClient, PrivManagerApi,
    PrivManagerClient, RetryPolicy,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(server.uri())
        .with_credentials("bk-dbm", "secret")
        .with_retry(
            RetryPolicy::builder()
                .max_retries(2)
                .initial_delay(Duration::from_millis(1))
                .build(),
        )
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "result": true,
        "code": 0,
        "message": "",
        "data": data,
    }))
}

#[tokio::test]
async fn query_conf_item_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bkconfig/v1/confitem/query"))
        .and(header_exists("X-Bkapi-Authorization"))
        .and(body_partial_json(json!({"level_name": "app", "format": "map", "namespace": "kafka"})))
        .respond_with(ok(json!({"content": {"log.retention.hours": "48"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = DbConfigClient::new(config(&server)).unwrap();
    let items = client
        .query_conf_item(QueryConfItemRequest {
            bk_biz_id: "3".into(),
            level_name: LevelName::App,
            level_value: "3".into(),
            conf_file: "2.4.0".into(),
            conf_type: "dbconf".into(),
            namespace: "kafka".into(),
            format: FormatType::Map,
        })
        .await
        .unwrap();

    assert_eq!(items.content.get("log.retention.hours"), Some(&json!("48")));
}

#[tokio::test]
async fn upsert_conf_item_accepts_null_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bkconfig/v1/confitem/upsert"))
        .and(body_partial_json(json!({"req_type": "SaveAndPublish", "level_name": "cluster"})))
        .respond_with(ok(serde_json::Value::Null))
        .mount(&server)
        .await;

    let client = DbConfigClient::new(config(&server)).unwrap();
    let result = client
        .upsert_conf_item(UpsertConfItemRequest {
            conf_file_info: ConfFileInfo {
                conf_file: "2.4.0".into(),
                conf_type: "dbconf".into(),
                namespace: "kafka".into(),
            },
            level_info: serde_json::Map::new(),
            conf_items: vec![ConfItem {
                conf_name: "partition_num".into(),
                conf_value: "3".into(),
                op_type: OpType::Update,
            }],
            bk_biz_id: "3".into(),
            level_name: LevelName::Cluster,
            level_value: "kafka.db".into(),
            confirm: 0,
            req_type: ReqType::SaveAndPublish,
        })
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn api_error_code_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drs/sqlserver/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": false,
            "code": 1_902_001,
            "message": "instance unreachable",
            "data": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DrsClient::new(config(&server)).unwrap();
    let err = client
        .sqlserver_rpc(SqlserverRpcRequest {
            bk_cloud_id: 0,
            addresses: vec!["1.1.1.1:48322".into()],
            cmds: vec!["select 1".into()],
            force: false,
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Api {
            code: 1_902_001,
            message: "instance unreachable".into()
        }
    );
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drs/sqlserver/rpc"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = DrsClient::new(config(&server)).unwrap();
    let err = client
        .sqlserver_rpc(SqlserverRpcRequest {
            bk_cloud_id: 0,
            addresses: vec![],
            cmds: vec![],
            force: false,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Http { status: 503, .. }));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drs/sqlserver/rpc"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no route"))
        .expect(1)
        .mount(&server)
        .await;

    let client = DrsClient::new(config(&server).with_retry(RetryPolicy::none())).unwrap();
    let err = client
        .sqlserver_rpc(SqlserverRpcRequest {
            bk_cloud_id: 0,
            addresses: vec![],
            cmds: vec![],
            force: false,
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Http {
            status: 404,
            body: "no route".into()
        }
    );
}

#[tokio::test]
async fn sqlserver_rpc_decodes_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drs/sqlserver/rpc"))
        .respond_with(ok(json!([{
            "address": "1.1.1.1:48322",
            "cmd_results": [{"cmd": "select name from sys.sql_logins", "table_data": [{"name": "app"}]}],
            "error_msg": ""
        }])))
        .mount(&server)
        .await;

    let client = DrsClient::new(config(&server)).unwrap();
    let results = client
        .sqlserver_rpc(SqlserverRpcRequest {
            bk_cloud_id: 0,
            addresses: vec!["1.1.1.1:48322".into()],
            cmds: vec!["select name from sys.sql_logins".into()],
            force: false,
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_success());
    assert_eq!(results[0].cmd_results[0].table_data[0]["name"], json!("app"));
}

#[tokio::test]
async fn modify_password_sends_base64() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/priv_manager/password/modify_password"))
        .and(body_partial_json(json!({
            "username": "kafka_user",
            "password": "cGFzcw==",
            "component": "kafka",
            "operator": "admin"
        })))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = PrivManagerClient::new(config(&server)).unwrap();
    client
        .modify_password(ModifyPasswordRequest {
            instances: vec![PasswordInstance {
                ip: "kafka.db".into(),
                port: 0,
                bk_cloud_id: 0,
            }],
            username: "kafka_user".into(),
            password: "pass".into(),
            component: "kafka".into(),
            operator: "admin".into(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn component_passwords_are_decoded_and_grouped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/priv_manager/password/get_password"))
        .respond_with(ok(json!({
            "count": 2,
            "items": [
                {"username": "proxy", "component": "proxy", "password": "cHJveHktcHdk"},
                {"username": "os_mysql", "component": "mysql", "password": "b3MtcHdk"}
            ]
        })))
        .mount(&server)
        .await;

    let client = PrivManagerClient::new(config(&server)).unwrap();
    let passwords = client
        .batch_query_components_password(vec![
            ComponentUser::new("proxy", "proxy"),
            ComponentUser::new("os_mysql", "mysql"),
        ])
        .await
        .unwrap();

    assert_eq!(passwords["proxy"]["proxy"], "proxy-pwd");
    assert_eq!(passwords["os_mysql"]["mysql"], "os-pwd");

    let single = client
        .get_component_password("proxy".into(), "proxy".into())
        .await
        .unwrap();
    assert_eq!(single, "proxy-pwd");

    let missing = client
        .get_component_password("nobody".into(), "proxy".into())
        .await
        .unwrap_err();
    assert!(matches!(missing, ApiError::NotFound(_)));
}

#[tokio::test]
async fn list_account_rules_returns_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/priv_manager/account/list_account_rules"))
        .and(body_partial_json(json!({"bk_biz_id": 3, "account_type": "sqlserver"})))
        .respond_with(ok(json!({
            "count": 1,
            "results": [{"account": {"account_id": 1, "user": "app"}, "rules": [{"rule_id": 1, "dbname": "db%"}]}]
        })))
        .mount(&server)
        .await;

    let client = PrivManagerClient::new(config(&server)).unwrap();
    let accounts = client
        .list_account_rules(ListAccountRulesRequest {
            bk_biz_id: 3,
            account_type: "sqlserver".into(),
            user: vec!["app".into()],
        })
        .await
        .unwrap();

    assert_eq!(accounts[0].account.user, "app");
    assert_eq!(accounts[0].rules[0].dbname, "db%");
}

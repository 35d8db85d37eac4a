//! Enable or disable the application logins of a `SQLServer` instance.

use super::{ComponentData, FlowFuture, ItemSpec, Service};
use crate::error::FlowError;
use dbm_clients::DrsApi;
use dbm_clients::drs::{RpcResult, SqlserverRpcRequest};
use dbm_core::models::{Cluster, StorageInstance};
use dbm_core::MetaStore;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Component code.
pub const EXEC_SQLSERVER_LOGIN_CODE: &str = "exec_sqlserver_login";

const LIST_LOGINS_SQL: &str =
    "SELECT name FROM master.sys.sql_logins WHERE type = 'S' AND principal_id > 1";

/// Logins the platform itself depends on.
const SYSTEM_LOGINS: &[&str] = &[
    "sa",
    "dbm_admin",
    "sqlserver_dbha",
    "sqlserver_monitor",
    "sqlserver_dts",
];

/// Action applied to the application logins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// `ALTER LOGIN .. ENABLE`.
    Enable,
    /// `ALTER LOGIN .. DISABLE`.
    Disable,
}

impl ExecMode {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Enable => "ENABLE",
            Self::Disable => "DISABLE",
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
        })
    }
}

#[derive(Debug, Deserialize)]
struct Kwargs {
    cluster_id: i64,
    exec_ip: String,
    exec_mode: ExecMode,
}

fn is_system_login(name: &str) -> bool {
    (name.starts_with("##") && name.ends_with("##")) || SYSTEM_LOGINS.contains(&name)
}

/// Bracket-quote an identifier, doubling any closing bracket inside it.
fn quote_name(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

fn result_for<'r>(results: &'r [RpcResult], address: &str) -> Option<&'r RpcResult> {
    results.iter().find(|r| r.address == address)
}

/// Run `mode` on every application login of `instance`.
///
/// Returns `Ok(false)` when DRS reports a failure on the instance.
///
/// # Errors
///
/// Returns [`FlowError::Api`] if DRS cannot be reached.
pub async fn exec_instance_app_login(
    drs: &dyn DrsApi,
    cluster: &Cluster,
    mode: ExecMode,
    instance: &StorageInstance,
) -> Result<bool, FlowError> {
    let address = instance.ip_port();

    let listed = drs
        .sqlserver_rpc(SqlserverRpcRequest {
            bk_cloud_id: cluster.bk_cloud_id,
            addresses: vec![address.clone()],
            cmds: vec![LIST_LOGINS_SQL.to_string()],
            force: false,
        })
        .await?;
    let Some(listed) = result_for(&listed, &address).filter(|r| r.is_success()) else {
        tracing::error!(%address, "Listing sqlserver logins failed");
        return Ok(false);
    };

    let cmds: Vec<String> = listed
        .cmd_results
        .iter()
        .flat_map(|r| r.table_data.iter())
        .filter_map(|row| row.get("name").and_then(|v| v.as_str()))
        .filter(|name| !is_system_login(name))
        .map(|name| format!("ALTER LOGIN {} {}", quote_name(name), mode.keyword()))
        .collect();
    if cmds.is_empty() {
        tracing::info!(%address, "No application logins to change");
        return Ok(true);
    }

    let altered = drs
        .sqlserver_rpc(SqlserverRpcRequest {
            bk_cloud_id: cluster.bk_cloud_id,
            addresses: vec![address.clone()],
            cmds,
            force: false,
        })
        .await?;
    match result_for(&altered, &address) {
        Some(result) if result.is_success() => Ok(true),
        other => {
            let error = other.map(|r| r.error_msg.as_str()).unwrap_or_default();
            tracing::error!(%address, %mode, error, "Altering sqlserver logins failed");
            Ok(false)
        }
    }
}

/// `exec_sqlserver_login` service.
pub struct ExecSqlserverLoginService {
    meta: Arc<dyn MetaStore>,
    drs: Arc<dyn DrsApi>,
}

impl ExecSqlserverLoginService {
    /// Service reading metadata from `meta` and running SQL through `drs`.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaStore>, drs: Arc<dyn DrsApi>) -> Self {
        Self { meta, drs }
    }

    async fn run(&self, data: &ComponentData) -> Result<bool, FlowError> {
        let kwargs: Kwargs = serde_json::from_value(data.require_input("kwargs")?.clone())
            .map_err(|e| FlowError::InvalidInput(format!("kwargs: {e}")))?;

        let cluster = self.meta.get_cluster(kwargs.cluster_id).await?;
        let instance = self
            .meta
            .storage_instances(cluster.id)
            .await?
            .into_iter()
            .find(|i| i.ip == kwargs.exec_ip)
            .ok_or_else(|| FlowError::InstanceNotFound {
                domain: cluster.immute_domain.clone(),
                ip: kwargs.exec_ip.clone(),
            })?;

        if exec_instance_app_login(self.drs.as_ref(), &cluster, kwargs.exec_mode, &instance).await? {
            let address = instance.ip_port();
            tracing::info!(
                mode = %kwargs.exec_mode,
                %address,
                "exec app-logins-[{}] in [{}] successfully",
                kwargs.exec_mode,
                address
            );
            return Ok(true);
        }
        Ok(false)
    }
}

impl Service for ExecSqlserverLoginService {
    fn execute<'a>(&'a self, data: &'a ComponentData) -> FlowFuture<'a, bool> {
        Box::pin(self.run(data))
    }

    fn inputs_format(&self) -> Vec<ItemSpec> {
        vec![ItemSpec::new(
            "kwargs",
            "dict",
            "cluster_id, exec_ip and exec_mode (enable or disable)",
        )]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use dbm_clients::drs::CmdResult;
    use dbm_core::ClusterType;
    use dbm_testing::{InMemoryStore, MockDrsApi, fixtures};
    use serde_json::{Map, json};

    const ADDRESS: &str = "1.1.1.1:48322";

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_cluster(fixtures::cluster(1, ClusterType::SqlserverHa, "sqlserver01.db"));
        store.insert_instance(fixtures::instance(1, 1, 100, "1.1.1.1", 48322, "backend_master"));
        store
    }

    fn data(exec_ip: &str, mode: &str) -> ComponentData {
        let mut inputs = Map::new();
        inputs.insert(
            "kwargs".to_string(),
            json!({"cluster_id": 1, "exec_ip": exec_ip, "exec_mode": mode}),
        );
        ComponentData::new(inputs)
    }

    fn logins(names: &[&str]) -> Vec<RpcResult> {
        let rows = names
            .iter()
            .map(|n| {
                let mut row = Map::new();
                row.insert("name".to_string(), json!(n));
                row
            })
            .collect();
        vec![RpcResult {
            address: ADDRESS.to_string(),
            cmd_results: vec![CmdResult {
                cmd: LIST_LOGINS_SQL.to_string(),
                table_data: rows,
                ..CmdResult::default()
            }],
            error_msg: String::new(),
        }]
    }

    #[tokio::test]
    async fn disables_application_logins_only() {
        let drs = MockDrsApi::new().respond(Ok(logins(&["sa", "##MS_Agent##", "app_rw", "dbm_admin", "app_ro"])));
        let service = ExecSqlserverLoginService::new(Arc::new(store()), Arc::new(drs.clone()));

        assert!(service.execute(&data("1.1.1.1", "disable")).await.unwrap());

        let requests = drs.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].addresses, vec![ADDRESS.to_string()]);
        assert_eq!(
            requests[1].cmds,
            vec![
                "ALTER LOGIN [app_rw] DISABLE".to_string(),
                "ALTER LOGIN [app_ro] DISABLE".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn unknown_ip_names_domain_and_ip() {
        let service = ExecSqlserverLoginService::new(Arc::new(store()), Arc::new(MockDrsApi::new()));
        let err = service.execute(&data("9.9.9.9", "enable")).await.unwrap_err();
        assert_eq!(
            err,
            FlowError::InstanceNotFound {
                domain: "sqlserver01.db".to_string(),
                ip: "9.9.9.9".to_string()
            }
        );
    }

    #[tokio::test]
    async fn drs_failure_marks_node_failed() {
        let mut failed = logins(&["app_rw"]);
        let drs = MockDrsApi::new().respond(Ok(logins(&["app_rw"]))).respond(Ok({
            failed[0].error_msg = "login failed".to_string();
            failed
        }));
        let service = ExecSqlserverLoginService::new(Arc::new(store()), Arc::new(drs));

        assert!(!service.execute(&data("1.1.1.1", "enable")).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_mode_is_rejected() {
        let service = ExecSqlserverLoginService::new(Arc::new(store()), Arc::new(MockDrsApi::new()));
        let err = service.execute(&data("1.1.1.1", "drop")).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn closing_bracket_in_login_is_escaped() {
        let drs = MockDrsApi::new().respond(Ok(logins(&["x] ENABLE; DROP LOGIN [sa"])));
        let service = ExecSqlserverLoginService::new(Arc::new(store()), Arc::new(drs.clone()));

        assert!(service.execute(&data("1.1.1.1", "disable")).await.unwrap());

        assert_eq!(
            drs.requests()[1].cmds,
            vec!["ALTER LOGIN [x]] ENABLE; DROP LOGIN [sa] DISABLE".to_string()]
        );
    }

    #[test]
    fn quote_name_doubles_closing_brackets() {
        assert_eq!(quote_name("app_rw"), "[app_rw]");
        assert_eq!(quote_name("a]b]"), "[a]]b]]]");
    }

    #[test]
    fn system_logins() {
        assert!(is_system_login("##MS_PolicyTsqlExecutionLogin##"));
        assert!(is_system_login("sa"));
        assert!(!is_system_login("app_rw"));
    }
}

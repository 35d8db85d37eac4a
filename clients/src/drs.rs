//! DB remote service (DRS): runs SQL on instances inside a cloud region.

use crate::ApiFuture;
use crate::error::ApiResult;
use crate::http::{BkApiClient, ClientConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `sqlserver/rpc` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlserverRpcRequest {
    /// Cloud region of the targets.
    pub bk_cloud_id: i64,
    /// `ip:port` targets.
    pub addresses: Vec<String>,
    /// Statements, run in order on every target.
    pub cmds: Vec<String>,
    /// Keep going after a failed statement.
    pub force: bool,
}

/// Result of one statement.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CmdResult {
    /// The statement.
    #[serde(default)]
    pub cmd: String,
    /// Returned rows.
    #[serde(default)]
    pub table_data: Vec<Map<String, Value>>,
    /// Affected rows.
    #[serde(default)]
    pub rows_affected: i64,
    /// Error, empty on success.
    #[serde(default)]
    pub error_msg: String,
}

/// Result of all statements on one target.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RpcResult {
    /// `ip:port`.
    #[serde(default)]
    pub address: String,
    /// Per statement results.
    #[serde(default)]
    pub cmd_results: Vec<CmdResult>,
    /// Connection level error, empty on success.
    #[serde(default)]
    pub error_msg: String,
}

impl RpcResult {
    /// Whether the target and every statement succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_msg.is_empty() && self.cmd_results.iter().all(|r| r.error_msg.is_empty())
    }
}

/// Operations of the DRS service.
pub trait DrsApi: Send + Sync {
    /// Run statements on SQLServer instances.
    fn sqlserver_rpc(&self, request: SqlserverRpcRequest) -> ApiFuture<'_, Vec<RpcResult>>;
}

/// HTTP implementation of [`DrsApi`].
#[derive(Debug, Clone)]
pub struct DrsClient {
    http: BkApiClient,
}

impl DrsClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Ok(Self {
            http: BkApiClient::new("drs", config)?,
        })
    }
}

impl DrsApi for DrsClient {
    fn sqlserver_rpc(&self, request: SqlserverRpcRequest) -> ApiFuture<'_, Vec<RpcResult>> {
        Box::pin(async move { self.http.post("drs/sqlserver/rpc", &request).await })
    }
}

//! DB configuration service.

use crate::ApiFuture;
use crate::http::{BkApiClient, ClientConfig};
use crate::error::ApiResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Level a configuration item is stored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelName {
    /// Platform default.
    Plat,
    /// Business.
    App,
    /// Module.
    Module,
    /// Cluster.
    Cluster,
}

/// Shape of a queried configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    /// `{name: value}`.
    Map,
    /// List of items with metadata.
    List,
}

/// Operation on a single item during upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    /// New item.
    Add,
    /// Existing item.
    Update,
    /// Drop item.
    Remove,
}

/// Whether an upsert is also published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReqType {
    /// Save a draft.
    SaveOnly,
    /// Save and publish.
    SaveAndPublish,
}

/// Configuration type of `dbconf` files.
pub const CONF_TYPE_DBCONF: &str = "dbconf";

/// Module level info used for cluster-level upserts.
pub const MODULE_DEFAULT: &str = "default";

/// `query_conf_item` parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryConfItemRequest {
    /// Business id, as a string.
    pub bk_biz_id: String,
    /// Level to read.
    pub level_name: LevelName,
    /// Level key.
    pub level_value: String,
    /// Configuration file (usually the db version).
    pub conf_file: String,
    /// Configuration type.
    pub conf_type: String,
    /// Namespace (db type).
    pub namespace: String,
    /// Result shape.
    pub format: FormatType,
}

/// `query_conf_item` result.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ConfItems {
    /// Items by name.
    #[serde(default)]
    pub content: Map<String, Value>,
}

/// Which file an upsert targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfFileInfo {
    /// Configuration file.
    pub conf_file: String,
    /// Configuration type.
    pub conf_type: String,
    /// Namespace.
    pub namespace: String,
}

/// One item of an upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfItem {
    /// Item name.
    pub conf_name: String,
    /// Item value.
    pub conf_value: String,
    /// Operation.
    pub op_type: OpType,
}

/// `upsert_conf_item` parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertConfItemRequest {
    /// Target file.
    pub conf_file_info: ConfFileInfo,
    /// Level metadata.
    pub level_info: Map<String, Value>,
    /// Items to write.
    pub conf_items: Vec<ConfItem>,
    /// Business id, as a string.
    pub bk_biz_id: String,
    /// Level to write.
    pub level_name: LevelName,
    /// Level key.
    pub level_value: String,
    /// 1 to skip the conflict confirmation.
    pub confirm: i32,
    /// Save or publish.
    pub req_type: ReqType,
}

/// Operations of the DB configuration service.
pub trait DbConfigApi: Send + Sync {
    /// Read configuration items at one level.
    fn query_conf_item(&self, request: QueryConfItemRequest) -> ApiFuture<'_, ConfItems>;

    /// Write configuration items at one level.
    fn upsert_conf_item(&self, request: UpsertConfItemRequest) -> ApiFuture<'_, Value>;
}

/// HTTP implementation of [`DbConfigApi`].
#[derive(Debug, Clone)]
pub struct DbConfigClient {
    http: BkApiClient,
}

impl DbConfigClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Ok(Self {
            http: BkApiClient::new("dbconfig", config)?,
        })
    }
}

impl DbConfigApi for DbConfigClient {
    fn query_conf_item(&self, request: QueryConfItemRequest) -> ApiFuture<'_, ConfItems> {
        Box::pin(async move {
            self.http
                .post("bkconfig/v1/confitem/query", &request)
                .await
        })
    }

    fn upsert_conf_item(&self, request: UpsertConfItemRequest) -> ApiFuture<'_, Value> {
        Box::pin(async move {
            self.http
                .post("bkconfig/v1/confitem/upsert", &request)
                .await
        })
    }
}

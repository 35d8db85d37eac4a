//! Write a Kafka cluster's configuration and credentials.

use super::{ComponentData, FlowFuture, ItemSpec, Service};
use crate::error::FlowError;
use dbm_clients::dbconfig::{
    CONF_TYPE_DBCONF, ConfFileInfo, ConfItem, FormatType, LevelName, MODULE_DEFAULT, OpType,
    QueryConfItemRequest, ReqType, UpsertConfItemRequest,
};
use dbm_clients::priv_manager::{ModifyPasswordRequest, PasswordInstance};
use dbm_clients::{DbConfigApi, PrivManagerApi};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Component code.
pub const KAFKA_CONFIG_CODE: &str = "kafka_config";

const NAMESPACE: &str = "kafka";
const FAKE_USER: &str = "kafka_fake_user";
const OPERATOR: &str = "admin";

/// Key whose presence marks a configuration written with the legacy names.
const LEGACY_MARKER: &str = "log.retention.hours";

struct GlobalData<'a>(&'a Map<String, Value>);

impl GlobalData<'_> {
    fn value(&self, key: &str) -> Result<&Value, FlowError> {
        self.0
            .get(key)
            .ok_or_else(|| FlowError::MissingInput(format!("global_data.{key}")))
    }

    /// Value rendered as a configuration string. Booleans and null use the
    /// `True`/`False`/`None` spelling the config service already stores.
    fn text(&self, key: &str) -> Result<String, FlowError> {
        Ok(match self.value(key)? {
            Value::String(s) => s.clone(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Null => "None".to_string(),
            other => other.to_string(),
        })
    }

    fn int(&self, key: &str) -> Result<i64, FlowError> {
        let value = self.value(key)?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| FlowError::InvalidInput(format!("global_data.{key} is not an integer")))
    }
}

/// `kafka_config` service.
pub struct KafkaConfigService {
    dbconfig: Arc<dyn DbConfigApi>,
    priv_manager: Arc<dyn PrivManagerApi>,
}

impl KafkaConfigService {
    /// Service writing through the given clients.
    #[must_use]
    pub fn new(dbconfig: Arc<dyn DbConfigApi>, priv_manager: Arc<dyn PrivManagerApi>) -> Self {
        Self {
            dbconfig,
            priv_manager,
        }
    }

    fn config_items(global: &GlobalData<'_>, legacy: bool) -> Result<Vec<ConfItem>, FlowError> {
        let mut items = vec![
            ("retention_hours", global.text("retention_hours")?),
            ("partition_num", global.text("partition_num")?),
            ("replication_num", global.text("replication_num")?),
            ("factor", global.text("factor")?),
            ("zookeeper_conf", global.text("zookeeper_conf")?),
            ("no_security", global.text("no_security")?),
        ];
        if legacy {
            let factor = global.text("factor")?;
            items.extend([
                ("log.retention.hours", global.text("retention_hours")?),
                ("num.partitions", global.text("partition_num")?),
                ("default.replication.factor", factor.clone()),
                ("offsets.topic.replication.factor", factor.clone()),
                ("transaction.state.log.replication.factor", factor.clone()),
                ("transaction.state.log.min.isr", factor),
                ("log.retention.bytes", global.text("retention_bytes")?),
                ("zookeeper.connect", global.text("zookeeper_connect")?),
            ]);
        }
        Ok(items
            .into_iter()
            .map(|(name, value)| ConfItem {
                conf_name: name.to_string(),
                conf_value: value,
                op_type: OpType::Update,
            })
            .collect())
    }

    async fn run(&self, data: &ComponentData) -> Result<bool, FlowError> {
        let global = data
            .require_input("global_data")?
            .as_object()
            .ok_or_else(|| FlowError::InvalidInput("global_data must be an object".to_string()))?;
        let global = GlobalData(global);

        let bk_biz_id = global.text("bk_biz_id")?;
        let db_version = global.text("db_version")?;
        let domain = global.text("domain")?;

        let current = self
            .dbconfig
            .query_conf_item(QueryConfItemRequest {
                bk_biz_id: bk_biz_id.clone(),
                level_name: LevelName::App,
                level_value: bk_biz_id.clone(),
                conf_file: db_version.clone(),
                conf_type: CONF_TYPE_DBCONF.to_string(),
                namespace: NAMESPACE.to_string(),
                format: FormatType::Map,
            })
            .await?;
        let legacy = current.content.contains_key(LEGACY_MARKER);

        let mut level_info = Map::new();
        level_info.insert("module".to_string(), json!(MODULE_DEFAULT));
        self.dbconfig
            .upsert_conf_item(UpsertConfItemRequest {
                conf_file_info: ConfFileInfo {
                    conf_file: db_version,
                    conf_type: CONF_TYPE_DBCONF.to_string(),
                    namespace: NAMESPACE.to_string(),
                },
                level_info,
                conf_items: Self::config_items(&global, legacy)?,
                bk_biz_id,
                level_name: LevelName::Cluster,
                level_value: domain.clone(),
                confirm: 0,
                req_type: ReqType::SaveAndPublish,
            })
            .await?;
        tracing::info!(%domain, legacy, "Kafka db config upserted");

        let instances = vec![PasswordInstance {
            ip: domain.clone(),
            port: 0,
            bk_cloud_id: global.int("bk_cloud_id")?,
        }];
        let username = global.text("username")?;
        // The fake user keeps the account name; it reaches the service base64 encoded.
        self.priv_manager
            .modify_password(ModifyPasswordRequest {
                instances: instances.clone(),
                username: FAKE_USER.to_string(),
                password: username.clone(),
                component: NAMESPACE.to_string(),
                operator: OPERATOR.to_string(),
            })
            .await?;
        self.priv_manager
            .modify_password(ModifyPasswordRequest {
                instances,
                username,
                password: global.text("password")?,
                component: NAMESPACE.to_string(),
                operator: OPERATOR.to_string(),
            })
            .await?;
        tracing::info!(%domain, "Kafka credentials written to the password service");

        data.set_output("result", json!("success"));
        Ok(true)
    }
}

impl Service for KafkaConfigService {
    fn execute<'a>(&'a self, data: &'a ComponentData) -> FlowFuture<'a, bool> {
        Box::pin(self.run(data))
    }

    fn inputs_format(&self) -> Vec<ItemSpec> {
        vec![
            ItemSpec::new("kwargs", "dict", "node arguments"),
            ItemSpec::new("global_data", "dict", "cluster, version and account settings"),
        ]
    }

    fn outputs_format(&self) -> Vec<ItemSpec> {
        vec![ItemSpec::new("result", "str", "command result")]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::components::{Component, ComponentLibrary};
    use dbm_clients::ApiError;
    use dbm_testing::{MockDbConfigApi, MockPrivManagerApi};

    fn global_data() -> Value {
        json!({
            "bk_biz_id": 3,
            "bk_cloud_id": 0,
            "db_version": "2.4.0",
            "domain": "kafka01.db",
            "retention_hours": 48,
            "partition_num": 3,
            "replication_num": 2,
            "factor": 2,
            "zookeeper_conf": "zk01:2181",
            "no_security": 0,
            "retention_bytes": -1,
            "zookeeper_connect": "zk01:2181/kafka01",
            "username": "kafka_admin",
            "password": "s3cret",
        })
    }

    fn data() -> ComponentData {
        let mut inputs = Map::new();
        inputs.insert("kwargs".to_string(), json!({}));
        inputs.insert("global_data".to_string(), global_data());
        ComponentData::new(inputs)
    }

    #[tokio::test]
    async fn writes_config_and_both_passwords() {
        let dbconfig = MockDbConfigApi::with_content(Map::new());
        let privs = MockPrivManagerApi::new();
        let service = KafkaConfigService::new(Arc::new(dbconfig.clone()), Arc::new(privs.clone()));
        let data = data();

        assert!(service.execute(&data).await.unwrap());

        let query = &dbconfig.queries()[0];
        assert_eq!(query.level_name, LevelName::App);
        assert_eq!(query.level_value, "3");
        assert_eq!(query.conf_file, "2.4.0");
        assert_eq!(query.namespace, "kafka");

        let upsert = &dbconfig.upserts()[0];
        assert_eq!(upsert.level_name, LevelName::Cluster);
        assert_eq!(upsert.level_value, "kafka01.db");
        assert_eq!(upsert.req_type, ReqType::SaveAndPublish);
        assert_eq!(upsert.level_info["module"], json!("default"));
        let names: Vec<&str> = upsert.conf_items.iter().map(|i| i.conf_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["retention_hours", "partition_num", "replication_num", "factor", "zookeeper_conf", "no_security"]
        );
        assert_eq!(upsert.conf_items[0].conf_value, "48");

        let modified = privs.modified();
        assert_eq!(modified.len(), 2);
        assert_eq!(modified[0].username, "kafka_fake_user");
        assert_eq!(modified[0].password, "kafka_admin");
        assert_eq!(modified[1].username, "kafka_admin");
        assert_eq!(modified[1].password, "s3cret");
        assert_eq!(modified[1].instances[0].ip, "kafka01.db");
        assert_eq!(modified[1].operator, "admin");
        assert_eq!(data.outputs()["result"], json!("success"));
    }

    #[tokio::test]
    async fn legacy_content_adds_dotted_keys() {
        let mut content = Map::new();
        content.insert("log.retention.hours".to_string(), json!("24"));
        let dbconfig = MockDbConfigApi::with_content(content);
        let service = KafkaConfigService::new(Arc::new(dbconfig.clone()), Arc::new(MockPrivManagerApi::new()));

        service.execute(&data()).await.unwrap();

        let items = &dbconfig.upserts()[0].conf_items;
        assert_eq!(items.len(), 14);
        let connect = items.iter().find(|i| i.conf_name == "zookeeper.connect").unwrap();
        assert_eq!(connect.conf_value, "zk01:2181/kafka01");
        let bytes = items.iter().find(|i| i.conf_name == "log.retention.bytes").unwrap();
        assert_eq!(bytes.conf_value, "-1");
    }

    #[tokio::test]
    async fn booleans_are_written_capitalized() {
        let dbconfig = MockDbConfigApi::with_content(Map::new());
        let service = KafkaConfigService::new(Arc::new(dbconfig.clone()), Arc::new(MockPrivManagerApi::new()));
        let mut global = global_data();
        global["no_security"] = json!(true);
        global["zookeeper_conf"] = json!(false);
        let mut inputs = Map::new();
        inputs.insert("global_data".to_string(), global);

        service.execute(&ComponentData::new(inputs)).await.unwrap();

        let items = &dbconfig.upserts()[0].conf_items;
        let value = |name: &str| items.iter().find(|i| i.conf_name == name).unwrap().conf_value.clone();
        assert_eq!(value("no_security"), "True");
        assert_eq!(value("zookeeper_conf"), "False");
        assert_eq!(value("partition_num"), "3");
    }

    #[tokio::test]
    async fn password_service_failure_propagates() {
        let privs = MockPrivManagerApi::new();
        privs.fail_with(ApiError::Api { code: 1, message: "denied".to_string() });
        let library = ComponentLibrary::new();
        library.register(Component {
            code: KAFKA_CONFIG_CODE,
            name: "Kafka config",
            service: Arc::new(KafkaConfigService::new(
                Arc::new(MockDbConfigApi::default()),
                Arc::new(privs),
            )),
        });

        let err = library.execute(KAFKA_CONFIG_CODE, &data()).await.unwrap_err();
        assert!(matches!(err, FlowError::Api(ApiError::Api { code: 1, .. })));
    }
}

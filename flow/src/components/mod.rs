//! Flow components: the atomic steps a controller scene strings together.
//!
//! A [`Component`] pairs a unique code with a [`Service`]. The
//! [`ComponentLibrary`] resolves codes to components and runs them with a
//! [`ComponentData`] holding the node inputs and collecting outputs.

mod kafka;
mod sqlserver;

pub use kafka::{KAFKA_CONFIG_CODE, KafkaConfigService};
pub use sqlserver::{EXEC_SQLSERVER_LOGIN_CODE, ExecMode, ExecSqlserverLoginService, exec_instance_app_login};

use crate::error::FlowError;
use dbm_clients::{DbConfigApi, DrsApi, PrivManagerApi};
use dbm_core::MetaStore;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Boxed future returned by [`Service::execute`].
pub type FlowFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FlowError>> + Send + 'a>>;

/// Describes one input or output key of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSpec {
    /// Key.
    pub key: &'static str,
    /// Value type, e.g. `dict` or `bool`.
    pub kind: &'static str,
    /// Description.
    pub description: &'static str,
}

impl ItemSpec {
    /// Shorthand constructor.
    #[must_use]
    pub const fn new(key: &'static str, kind: &'static str, description: &'static str) -> Self {
        Self {
            key,
            kind,
            description,
        }
    }
}

/// Inputs and outputs of one node execution.
#[derive(Debug, Default)]
pub struct ComponentData {
    inputs: Map<String, Value>,
    outputs: Mutex<Map<String, Value>>,
}

impl ComponentData {
    /// Data with the given inputs and no outputs.
    #[must_use]
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self {
            inputs,
            outputs: Mutex::new(Map::new()),
        }
    }

    /// Input `key`, if present.
    #[must_use]
    pub fn get_one_of_inputs(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    /// Input `key`, or [`FlowError::MissingInput`].
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::MissingInput`] if the key is absent.
    pub fn require_input(&self, key: &str) -> Result<&Value, FlowError> {
        self.get_one_of_inputs(key)
            .ok_or_else(|| FlowError::MissingInput(key.to_string()))
    }

    /// Record an output.
    pub fn set_output(&self, key: impl Into<String>, value: Value) {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// Snapshot of the outputs.
    #[must_use]
    pub fn outputs(&self) -> Map<String, Value> {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Behaviour of a flow component.
pub trait Service: Send + Sync {
    /// Run the step. `Ok(false)` marks the node failed without an error.
    fn execute<'a>(&'a self, data: &'a ComponentData) -> FlowFuture<'a, bool>;

    /// Keys read from the inputs.
    fn inputs_format(&self) -> Vec<ItemSpec> {
        Vec::new()
    }

    /// Keys written to the outputs.
    fn outputs_format(&self) -> Vec<ItemSpec> {
        Vec::new()
    }
}

/// A service published under a unique code.
#[derive(Clone)]
pub struct Component {
    /// Unique code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Implementation.
    pub service: Arc<dyn Service>,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("code", &self.code)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry of components keyed by code.
#[derive(Clone, Default)]
pub struct ComponentLibrary {
    components: Arc<RwLock<HashMap<&'static str, Component>>>,
}

impl ComponentLibrary {
    /// Empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with `exec_sqlserver_login` and `kafka_config` registered.
    #[must_use]
    pub fn with_defaults(
        meta: Arc<dyn MetaStore>,
        drs: Arc<dyn DrsApi>,
        dbconfig: Arc<dyn DbConfigApi>,
        priv_manager: Arc<dyn PrivManagerApi>,
    ) -> Self {
        let library = Self::new();
        library.register(Component {
            code: EXEC_SQLSERVER_LOGIN_CODE,
            name: "SQLServer 业务账号启停",
            service: Arc::new(ExecSqlserverLoginService::new(meta, drs)),
        });
        library.register(Component {
            code: KAFKA_CONFIG_CODE,
            name: "Kafka 配置写入",
            service: Arc::new(KafkaConfigService::new(dbconfig, priv_manager)),
        });
        library
    }

    /// Register a component, returning `true` if its code was taken.
    pub fn register(&self, component: Component) -> bool {
        let code = component.code;
        let replaced = self
            .components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code, component)
            .is_some();
        if replaced {
            tracing::warn!(code, "Flow component replaced");
        }
        replaced
    }

    /// Component registered under `code`.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<Component> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned()
    }

    /// Registered codes, sorted.
    #[must_use]
    pub fn codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<&'static str> = self
            .components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        codes.sort_unstable();
        codes
    }

    /// Run the component registered under `code`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::ComponentNotFound`] for an unknown code, or the
    /// error of the component itself.
    pub async fn execute(&self, code: &str, data: &ComponentData) -> Result<bool, FlowError> {
        let component = self
            .get(code)
            .ok_or_else(|| FlowError::ComponentNotFound(code.to_string()))?;

        let result = component.service.execute(data).await;
        let outcome = match &result {
            Ok(true) => "success",
            Ok(false) => "failed",
            Err(_) => "error",
        };
        metrics::counter!("flow.component.executed", "code" => component.code, "outcome" => outcome)
            .increment(1);
        match &result {
            Ok(success) => tracing::info!(code = component.code, success, "Flow component executed"),
            Err(e) => tracing::error!(code = component.code, error = %e, "Flow component failed"),
        }
        result
    }
}

impl fmt::Debug for ComponentLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentLibrary")
            .field("codes", &self.codes())
            .finish()
    }
}

//! Ticket flow builders.
//!
//! A ticket engine looks up a [`Registration`] by [`TicketType`] in the
//! [`BuilderFactory`] and asks it for a [`FlowPlan`]: the validated ticket
//! details plus the ordered flows to run (resource apply, the inner flow that
//! drives a controller scene, host recycle).
//!
//! # Example
//!
//! ```ignore
//! let factory = BuilderFactory::with_defaults(meta_store);
//! let plan = factory.build_flows(ticket).await?;
//! for flow in &plan.flows {
//!     println!("{flow:?}");
//! }
//! ```

mod bigdata;
mod common;
mod kafka;
mod sqlserver;
mod tendbcluster;

pub use bigdata::{BigDataReplaceDetails, HostInfo, IpSource, ResourceSpec};
pub use common::TakeDownDetails;
pub use kafka::{KafkaReplaceFlowBuilder, KafkaReplaceResourceParamBuilder};
pub use sqlserver::SqlserverDestroyFlowBuilder;
pub use tendbcluster::TendbDestroyFlowBuilder;

use crate::error::BuilderError;
use dbm_core::models::Ticket;
use dbm_core::{ClusterPhase, FlowRetryType, MetaStore, PoolType, TicketType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

/// Boxed future returned by async builder hooks.
pub type BuilderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BuilderError>> + Send + 'a>>;

/// A controller scene the inner flow runs, e.g.
/// `SpiderController.spider_cluster_destroy_scene`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneRef {
    /// Controller name.
    pub controller: &'static str,
    /// Scene method.
    pub scene: &'static str,
}

impl SceneRef {
    /// Shorthand constructor.
    #[must_use]
    pub const fn new(controller: &'static str, scene: &'static str) -> Self {
        Self { controller, scene }
    }
}

impl fmt::Display for SceneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.controller, self.scene)
    }
}

impl Serialize for SceneRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where hosts go once a ticket releases them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecycleDetails {
    /// Business that receives the hosts, 0 for the shared pool.
    #[serde(default)]
    pub for_biz: i64,
    /// Pool the hosts move to.
    #[serde(default = "default_ip_dest")]
    pub ip_dest: PoolType,
}

const fn default_ip_dest() -> PoolType {
    PoolType::Recycle
}

impl Default for HostRecycleDetails {
    fn default() -> Self {
        Self {
            for_biz: 0,
            ip_dest: default_ip_dest(),
        }
    }
}

/// One step of a ticket's execution plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "flow_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowSpec {
    /// Apply hosts from the resource pool.
    ResourceApply {
        /// Resource request.
        params: Value,
    },
    /// Run a controller scene.
    InnerFlow {
        /// Display name.
        name: String,
        /// Scene to run.
        scene: SceneRef,
        /// Retry behaviour of failed nodes.
        retry_type: FlowRetryType,
        /// Scene input.
        flow_data: Value,
    },
    /// Hand released hosts over to a pool.
    HostRecycle {
        /// Receiving business.
        for_biz: i64,
        /// Target pool.
        ip_dest: PoolType,
        /// Released hosts.
        hosts: Vec<Value>,
    },
}

/// Validated ticket and the flows to run for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowPlan {
    /// Ticket kind.
    pub ticket_type: TicketType,
    /// Business.
    pub bk_biz_id: i64,
    /// Validated (and patched) details.
    pub details: Value,
    /// Flows in execution order.
    pub flows: Vec<FlowSpec>,
}

/// Builds resource-apply parameters and consumes the applied hosts.
pub trait ResourceParamBuilder: Send + Sync {
    /// Resource request for a validated ticket.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Validation`] if the details cannot be turned
    /// into a request.
    fn build(&self, ticket: &Ticket) -> Result<Value, BuilderError>;

    /// Write hosts returned by the resource pool back into the details.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Validation`] if `applied` misses a requested
    /// group.
    fn post_callback(&self, details: &mut Value, applied: &Value) -> Result<(), BuilderError>;
}

/// How one ticket type is validated and turned into flows.
pub trait TicketFlowBuilder: Send + Sync {
    /// Ticket kind handled by this builder.
    fn ticket_type(&self) -> TicketType;

    /// Display name of the inner flow.
    fn inner_flow_name(&self) -> &'static str;

    /// Controller scene of the inner flow.
    fn scene(&self) -> SceneRef;

    /// Retry behaviour of the inner flow.
    fn retry_type(&self) -> FlowRetryType {
        FlowRetryType::AutoRetry
    }

    /// Whether recycle hosts and cluster summaries are written into the
    /// details before the flows are built.
    fn need_patch_recycle_cluster_details(&self) -> bool {
        false
    }

    /// Validate `ticket.details`, returning the normalised details.
    fn validate_details<'a>(&'a self, ticket: &'a Ticket) -> BuilderFuture<'a, Value>;

    /// Input of the inner flow.
    fn flow_data(&self, ticket: &Ticket) -> Value {
        format_ticket_data(ticket)
    }

    /// Resource apply hook, for types that take hosts from the pool.
    fn resource_param_builder(&self) -> Option<&dyn ResourceParamBuilder> {
        None
    }

    /// Hosts the ticket releases.
    fn recycle_hosts(&self, details: &Value) -> Vec<Value> {
        details
            .get("recycle_hosts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// A builder plus the flags it was registered with.
#[derive(Clone)]
pub struct Registration {
    /// The builder.
    pub builder: Arc<dyn TicketFlowBuilder>,
    /// Phase the ticket's clusters move to, if any.
    pub phase: Option<ClusterPhase>,
    /// Ticket applies hosts from the resource pool.
    pub is_apply: bool,
    /// Ticket releases hosts.
    pub is_recycle: bool,
}

impl Registration {
    /// Registration without flags.
    #[must_use]
    pub fn new(builder: Arc<dyn TicketFlowBuilder>) -> Self {
        Self {
            builder,
            phase: None,
            is_apply: false,
            is_recycle: false,
        }
    }

    /// Set the target cluster phase.
    #[must_use]
    pub fn phase(mut self, phase: ClusterPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Mark as applying hosts.
    #[must_use]
    pub fn apply(mut self) -> Self {
        self.is_apply = true;
        self
    }

    /// Mark as releasing hosts.
    #[must_use]
    pub fn recycle(mut self) -> Self {
        self.is_recycle = true;
        self
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("ticket_type", &self.builder.ticket_type())
            .field("phase", &self.phase)
            .field("is_apply", &self.is_apply)
            .field("is_recycle", &self.is_recycle)
            .finish()
    }
}

/// Serializable summary of a registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationInfo {
    /// Ticket kind.
    pub ticket_type: TicketType,
    /// Ticket kind label.
    pub ticket_type_display: &'static str,
    /// Target cluster phase.
    pub phase: Option<ClusterPhase>,
    /// Applies hosts.
    pub is_apply: bool,
    /// Releases hosts.
    pub is_recycle: bool,
    /// Inner flow name.
    pub inner_flow_name: &'static str,
    /// Inner flow scene.
    pub scene: SceneRef,
    /// Inner flow retry type.
    pub retry_type: FlowRetryType,
}

/// Registry of flow builders keyed by ticket type.
#[derive(Clone)]
pub struct BuilderFactory {
    registry: Arc<RwLock<HashMap<TicketType, Registration>>>,
    meta: Arc<dyn MetaStore>,
}

impl BuilderFactory {
    /// Empty factory reading metadata from `meta`.
    #[must_use]
    pub fn new(meta: Arc<dyn MetaStore>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            meta,
        }
    }

    /// Factory with the TenDB cluster destroy, SQLServer destroy and Kafka
    /// replace builders registered.
    #[must_use]
    pub fn with_defaults(meta: Arc<dyn MetaStore>) -> Self {
        let factory = Self::new(Arc::clone(&meta));
        factory.register(
            Registration::new(Arc::new(TendbDestroyFlowBuilder::new(Arc::clone(&meta))))
                .phase(ClusterPhase::Destroy)
                .recycle(),
        );
        factory.register(
            Registration::new(Arc::new(SqlserverDestroyFlowBuilder::new(Arc::clone(&meta))))
                .phase(ClusterPhase::Destroy)
                .recycle(),
        );
        factory.register(
            Registration::new(Arc::new(KafkaReplaceFlowBuilder::new(meta)))
                .apply()
                .recycle(),
        );
        factory
    }

    /// Register a builder under its ticket type.
    ///
    /// If the type is already registered the old registration is replaced
    /// and this method returns `true`.
    pub fn register(&self, registration: Registration) -> bool {
        let ticket_type = registration.builder.ticket_type();
        let replaced = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ticket_type, registration)
            .is_some();
        if replaced {
            tracing::warn!(%ticket_type, "Flow builder replaced");
        }
        replaced
    }

    /// Registration of `ticket_type`.
    #[must_use]
    pub fn get(&self, ticket_type: TicketType) -> Option<Registration> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ticket_type)
            .cloned()
    }

    /// Registered ticket types, sorted by wire value.
    #[must_use]
    pub fn registered_types(&self) -> Vec<TicketType> {
        let mut types: Vec<TicketType> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        types.sort_by_key(TicketType::as_str);
        types
    }

    /// Summaries of every registration, sorted by ticket type.
    #[must_use]
    pub fn registrations(&self) -> Vec<RegistrationInfo> {
        self.registered_types()
            .into_iter()
            .filter_map(|ticket_type| self.get(ticket_type))
            .map(|r| RegistrationInfo {
                ticket_type: r.builder.ticket_type(),
                ticket_type_display: r.builder.ticket_type().label(),
                phase: r.phase,
                is_apply: r.is_apply,
                is_recycle: r.is_recycle,
                inner_flow_name: r.builder.inner_flow_name(),
                scene: r.builder.scene(),
                retry_type: r.builder.retry_type(),
            })
            .collect()
    }

    /// Validate `ticket` and plan its flows.
    ///
    /// # Errors
    ///
    /// - [`BuilderError::NotRegistered`] if no builder handles the type
    /// - [`BuilderError::Validation`] if the details are invalid or a
    ///   cluster cannot move to the registered phase
    /// - [`BuilderError::Store`] if metadata cannot be read
    pub async fn build_flows(&self, mut ticket: Ticket) -> Result<FlowPlan, BuilderError> {
        let registration = self
            .get(ticket.ticket_type)
            .ok_or(BuilderError::NotRegistered(ticket.ticket_type))?;
        let builder = Arc::clone(&registration.builder);

        ticket.details = builder.validate_details(&ticket).await?;

        if let Some(phase) = registration.phase {
            self.check_cluster_phase(&ticket.details, phase).await?;
        }
        if builder.need_patch_recycle_cluster_details() {
            patch_recycle_cluster_details(self.meta.as_ref(), &mut ticket.details).await?;
        }

        let mut flows = Vec::new();
        if registration.is_apply && needs_resource_apply(&ticket.details) {
            if let Some(resource) = builder.resource_param_builder() {
                flows.push(FlowSpec::ResourceApply {
                    params: resource.build(&ticket)?,
                });
            }
        }
        flows.push(FlowSpec::InnerFlow {
            name: builder.inner_flow_name().to_string(),
            scene: builder.scene(),
            retry_type: builder.retry_type(),
            flow_data: builder.flow_data(&ticket),
        });
        if registration.is_recycle {
            let recycle: HostRecycleDetails = ticket
                .details
                .get("ip_recycle")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| BuilderError::invalid(format!("ip_recycle: {e}")))?
                .unwrap_or_default();
            let hosts = builder.recycle_hosts(&ticket.details);
            if !hosts.is_empty() {
                flows.push(FlowSpec::HostRecycle {
                    for_biz: recycle.for_biz,
                    ip_dest: recycle.ip_dest,
                    hosts,
                });
            }
        }

        tracing::info!(
            ticket_id = ticket.id,
            ticket_type = %ticket.ticket_type,
            flows = flows.len(),
            "Ticket flows built"
        );

        Ok(FlowPlan {
            ticket_type: ticket.ticket_type,
            bk_biz_id: ticket.bk_biz_id,
            details: ticket.details,
            flows,
        })
    }

    async fn check_cluster_phase(
        &self,
        details: &Value,
        phase: ClusterPhase,
    ) -> Result<(), BuilderError> {
        let clusters = self.meta.list_clusters(cluster_ids_of(details)).await?;
        let blocked: Vec<String> = clusters
            .iter()
            .filter(|c| !c.phase.can_transfer_to(phase))
            .map(|c| format!("{}({})", c.immute_domain, c.phase))
            .collect();
        if blocked.is_empty() {
            Ok(())
        } else {
            Err(BuilderError::invalid(format!(
                "clusters cannot move to {phase}: {}",
                blocked.join(", ")
            )))
        }
    }
}

impl fmt::Debug for BuilderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderFactory")
            .field("registered_types", &self.registered_types())
            .finish_non_exhaustive()
    }
}

fn needs_resource_apply(details: &Value) -> bool {
    details.get("ip_source").and_then(Value::as_str) == Some(IpSource::ResourcePool.as_str())
}

/// Cluster ids of `details`: `cluster_ids`, or the single `cluster_id`.
#[must_use]
pub fn cluster_ids_of(details: &Value) -> Vec<i64> {
    if let Some(ids) = details.get("cluster_ids").and_then(Value::as_array) {
        return ids.iter().filter_map(Value::as_i64).collect();
    }
    details
        .get("cluster_id")
        .and_then(Value::as_i64)
        .into_iter()
        .collect()
}

/// Inner flow input: the ticket details plus ticket identity.
#[must_use]
pub fn format_ticket_data(ticket: &Ticket) -> Value {
    let mut data = match &ticket.details {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    data.insert("uid".to_string(), json!(ticket.id));
    data.insert("created_by".to_string(), json!(ticket.creator));
    data.insert("bk_biz_id".to_string(), json!(ticket.bk_biz_id));
    data.insert("ticket_type".to_string(), json!(ticket.ticket_type));
    Value::Object(data)
}

/// Write the hosts of the ticket's clusters (`recycle_hosts`) and a summary
/// of each cluster (`clusters`, keyed by id) into `details`.
///
/// # Errors
///
/// Returns [`BuilderError::Store`] if metadata cannot be read.
pub async fn patch_recycle_cluster_details(
    meta: &dyn MetaStore,
    details: &mut Value,
) -> Result<(), BuilderError> {
    let clusters = meta.list_clusters(cluster_ids_of(details)).await?;

    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    let mut summaries = BTreeMap::new();
    for cluster in &clusters {
        for instance in meta.storage_instances(cluster.id).await? {
            if seen.insert(instance.bk_host_id) {
                hosts.push(json!({
                    "bk_host_id": instance.bk_host_id,
                    "ip": instance.ip,
                    "bk_cloud_id": cluster.bk_cloud_id,
                }));
            }
        }
        summaries.insert(
            cluster.id.to_string(),
            json!({
                "id": cluster.id,
                "name": cluster.name,
                "immute_domain": cluster.immute_domain,
                "cluster_type": cluster.cluster_type,
                "bk_cloud_id": cluster.bk_cloud_id,
                "major_version": cluster.major_version,
                "phase": cluster.phase,
            }),
        );
    }

    if let Value::Object(map) = details {
        map.insert("recycle_hosts".to_string(), Value::Array(hosts));
        map.insert("clusters".to_string(), json!(summaries));
    }
    Ok(())
}

//! Flow component endpoints called by the pipeline engine.

use crate::WebResult;
use crate::extractors::ValidJson;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use dbm_flow::ComponentData;
use dbm_flow::components::ItemSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A registered component and its data contract.
#[derive(Debug, Serialize)]
pub struct ComponentInfo {
    /// Unique code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Keys read from the inputs.
    pub inputs_format: Vec<ItemSpec>,
    /// Keys written to the outputs.
    pub outputs_format: Vec<ItemSpec>,
}

/// Body of `execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    /// Node inputs.
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// Outcome of one node execution.
#[derive(Debug, Serialize)]
pub struct ExecuteResult {
    /// Whether the node succeeded.
    pub result: bool,
    /// Outputs written by the component.
    pub outputs: Map<String, Value>,
}

/// `GET /apis/flow/components/`
#[allow(clippy::unused_async)]
pub async fn list_components(State(state): State<AppState>) -> Json<Vec<ComponentInfo>> {
    let components = state
        .components
        .codes()
        .into_iter()
        .filter_map(|code| state.components.get(code))
        .map(|c| ComponentInfo {
            code: c.code,
            name: c.name,
            inputs_format: c.service.inputs_format(),
            outputs_format: c.service.outputs_format(),
        })
        .collect();
    Json(components)
}

/// `POST /apis/flow/components/{code}/execute/`
///
/// # Errors
///
/// Returns 404 for an unknown code or instance, 400 for bad inputs and 502
/// when an external service fails.
pub async fn execute(
    State(state): State<AppState>,
    Path(code): Path<String>,
    ValidJson(body): ValidJson<ExecuteBody>,
) -> WebResult<Json<ExecuteResult>> {
    let data = ComponentData::new(body.inputs);
    let result = state.components.execute(&code, &data).await?;
    Ok(Json(ExecuteResult {
        result,
        outputs: data.outputs(),
    }))
}

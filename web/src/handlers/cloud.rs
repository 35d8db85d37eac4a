//! Cloud proxy pass endpoints under `/apis/proxypass/cloud/`.

use crate::WebResult;
use crate::extractors::{Operator, ValidJson};
use crate::nginx::NginxConfFile;
use crate::services::cloud::{CloudService, InsertExtension};
use crate::state::AppState;
use axum::{Json, extract::State};
use dbm_core::ExtensionType;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Body of `insert`.
#[derive(Debug, Deserialize)]
pub struct InsertBody {
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Service kind.
    pub extension: ExtensionType,
    /// Service details.
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Body of `pull_nginx_conf`.
#[derive(Debug, Deserialize)]
pub struct PullNginxConfBody {
    /// Cloud region.
    pub bk_cloud_id: i64,
}

/// `POST /apis/proxypass/cloud/insert/`
///
/// # Errors
///
/// Returns 400 for invalid bodies, 502 when the password service fails.
pub async fn insert(
    State(state): State<AppState>,
    Operator(operator): Operator,
    ValidJson(body): ValidJson<InsertBody>,
) -> WebResult<Json<Value>> {
    let output = CloudService::new(state)
        .insert(
            &operator,
            InsertExtension {
                bk_cloud_id: body.bk_cloud_id,
                extension: body.extension,
                details: body.details,
            },
        )
        .await?;
    Ok(Json(output))
}

/// `POST /apis/proxypass/cloud/pull_nginx_conf/`
///
/// # Errors
///
/// Returns 404 when the cloud has no nginx proxy to publish through.
pub async fn pull_nginx_conf(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<PullNginxConfBody>,
) -> WebResult<Json<Vec<NginxConfFile>>> {
    let files = CloudService::new(state).pull_nginx_conf(body.bk_cloud_id).await?;
    Ok(Json(files))
}

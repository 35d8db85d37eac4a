//! SQLServer authorization endpoints.

use crate::WebResult;
use crate::extractors::{Operator, ValidJson};
use crate::services::authorize::{PreCheckResult, SqlserverAuthorizeHandler, SqlserverAuthorizeMeta};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};

/// `POST /apis/sqlserver/bizs/{bk_biz_id}/permission/authorize/pre_check_rules/`
///
/// # Errors
///
/// Returns 400 for invalid requests; failed checks are reported in the body.
pub async fn pre_check_rules(
    State(state): State<AppState>,
    Path(bk_biz_id): Path<i64>,
    Operator(operator): Operator,
    ValidJson(meta): ValidJson<SqlserverAuthorizeMeta>,
) -> WebResult<Json<PreCheckResult>> {
    let result = SqlserverAuthorizeHandler::new(state, bk_biz_id, operator)
        .multi_user_pre_check_rules(meta)
        .await?;
    Ok(Json(result))
}

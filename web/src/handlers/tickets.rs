//! Ticket flow planning endpoints under `/apis/tickets/`.

use crate::WebResult;
use crate::extractors::{Operator, ValidJson};
use crate::state::AppState;
use axum::{Json, extract::State};
use dbm_core::TicketType;
use dbm_core::models::Ticket;
use dbm_flow::FlowPlan;
use dbm_flow::builders::RegistrationInfo;
use serde::Deserialize;
use serde_json::Value;

/// Body of `build_flows`.
#[derive(Debug, Deserialize)]
pub struct BuildFlowsBody {
    /// Ticket id, 0 for a ticket that is not saved yet.
    #[serde(default)]
    pub id: i64,
    /// Ticket kind.
    pub ticket_type: TicketType,
    /// Business.
    pub bk_biz_id: i64,
    /// Type specific payload.
    pub details: Value,
}

/// `GET /apis/tickets/flow_types/`
#[allow(clippy::unused_async)]
pub async fn flow_types(State(state): State<AppState>) -> Json<Vec<RegistrationInfo>> {
    Json(state.builders.registrations())
}

/// `POST /apis/tickets/build_flows/`
///
/// # Errors
///
/// Returns 400 when the ticket type has no builder or the details are invalid.
pub async fn build_flows(
    State(state): State<AppState>,
    Operator(operator): Operator,
    ValidJson(body): ValidJson<BuildFlowsBody>,
) -> WebResult<Json<FlowPlan>> {
    let ticket = Ticket {
        id: body.id,
        ticket_type: body.ticket_type,
        creator: operator,
        bk_biz_id: body.bk_biz_id,
        status: "PENDING".to_string(),
        details: body.details,
    };
    let plan = state.builders.build_flows(ticket).await?;
    Ok(Json(plan))
}

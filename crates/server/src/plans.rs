//! Plan catalog and subscription endpoints.

use api_types::plan::{PlanView, PlansResponse, UpgradeRequest};
use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{ServerError, entitlements::feature_view, server::ServerState};

pub(crate) fn plan_view(plan: &engine::Plan) -> PlanView {
    PlanView {
        id: plan.id,
        name: plan.name.clone(),
        price_cents: plan.price_cents,
        display_order: plan.display_order,
        features: plan.features.iter().map(feature_view).collect(),
    }
}

pub async fn list(
    Extension(_user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<PlansResponse>, ServerError> {
    let plans = state.engine.list_plans().await?;
    Ok(Json(PlansResponse {
        plans: plans.iter().map(plan_view).collect(),
    }))
}

/// Moves the caller onto another plan. Sticker propagation is additive; see
/// the engine's reconciliation rules.
pub async fn upgrade(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<UpgradeRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .change_subscription(&user.id, payload.plan_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Entitlement resolution endpoint.

use api_types::entitlements::{EntitlementsResponse, FeatureValue as FeatureValueView, FeatureView};
use axum::{Extension, Json, extract::State};

use crate::{ServerError, server::ServerState, user::role_view};

pub(crate) fn feature_view(feature: &engine::Feature) -> FeatureView {
    FeatureView {
        key: feature.key.as_str().to_string(),
        value: match &feature.value {
            engine::FeatureValue::Bool(value) => FeatureValueView::Bool(*value),
            engine::FeatureValue::Int(value) => FeatureValueView::Int(*value),
            engine::FeatureValue::Text(value) => FeatureValueView::Text(value.clone()),
        },
        label: feature.label.clone(),
    }
}

pub async fn get_entitlements(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<EntitlementsResponse>, ServerError> {
    let entitlements = state.engine.entitlements(&user.id).await?;
    Ok(Json(EntitlementsResponse {
        role: role_view(entitlements.role.as_str()),
        plan_id: entitlements.plan.id,
        plan: entitlements.plan.name.clone(),
        features: entitlements
            .plan
            .features
            .iter()
            .map(feature_view)
            .collect(),
        stickers: entitlements.stickers,
    }))
}

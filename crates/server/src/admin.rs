//! Admin endpoints. The engine re-checks the admin role on every call; the
//! routes only shape the requests.

use api_types::{
    admin::{RoleUpdate, StickerGrant},
    plan::{FeatureUpsert, PlanCreated, PlanNew, PlanStickersUpdate, PlanStickersUpdated},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

pub async fn create_plan(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<PlanNew>,
) -> Result<(StatusCode, Json<PlanCreated>), ServerError> {
    let id = state
        .engine
        .create_plan(
            &payload.name,
            payload.price_cents,
            payload.display_order,
            &user.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(PlanCreated { id })))
}

/// Wholesale sticker redefinition; responds with the subscriber
/// propagation counts.
pub async fn set_plan_stickers(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<PlanStickersUpdate>,
) -> Result<Json<PlanStickersUpdated>, ServerError> {
    let report = state
        .engine
        .redefine_plan_stickers(plan_id, &payload.sticker_ids, &user.id)
        .await?;
    Ok(Json(PlanStickersUpdated {
        affected_user_count: report.affected_users,
        failed_user_count: report.failed_users,
    }))
}

pub async fn set_plan_feature(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<FeatureUpsert>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .set_plan_feature(
            plan_id,
            &payload.key,
            &payload.value,
            payload.label.as_deref(),
            payload.sort_order,
            &user.id,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn grant_sticker(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path(target_user_id): Path<String>,
    Json(payload): Json<StickerGrant>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .grant_user_sticker(&target_user_id, &payload.sticker_id, &user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn revoke_sticker(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path((target_user_id, sticker_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .revoke_user_sticker(&target_user_id, &sticker_id, &user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path(target_user_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_user(&target_user_id, &user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_role(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path(target_user_id): Path<String>,
    Json(payload): Json<RoleUpdate>,
) -> Result<StatusCode, ServerError> {
    let role = engine::Role::try_from(payload.role.as_str())?;
    state
        .engine
        .set_role(&target_user_id, role, &user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

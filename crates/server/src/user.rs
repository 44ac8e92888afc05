//! Profile and session endpoints for the authenticated user.

use api_types::user::{ProfileUpdate, UserView};
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{ServerError, server::ServerState};

pub(crate) fn role_view(role: &str) -> api_types::Role {
    match role {
        "admin" => api_types::Role::Admin,
        "premium" => api_types::Role::Premium,
        "advanced" => api_types::Role::Advanced,
        _ => api_types::Role::Free,
    }
}

pub(crate) fn user_view(user: &engine::users::Model) -> UserView {
    UserView {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        role: role_view(&user.role),
        email_verified: user.email_verified,
    }
}

pub async fn get_profile(Extension(user): Extension<engine::users::Model>) -> Json<UserView> {
    Json(user_view(&user))
}

pub async fn update_profile(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<UserView>, ServerError> {
    let updated = state
        .engine
        .update_profile(&user.id, payload.display_name.as_deref())
        .await?;
    Ok(Json(user_view(&updated)))
}

/// Deletes the caller's account and everything hanging off it.
pub async fn delete_account(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_user(&user.id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revokes the presented session token. Basic-auth callers have no token;
/// for them this is a no-op.
pub async fn logout(
    Extension(_user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<StatusCode, ServerError> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        state.engine.revoke_session(bearer.token()).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

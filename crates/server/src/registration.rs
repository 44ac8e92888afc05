//! Registration and login endpoints (unauthenticated).

use api_types::{
    registration::{RegisterRequest, ResendRequest, VerifyRequest},
    user::{LoginRequest, SessionResponse},
};
use axum::{Json, extract::State, http::StatusCode};

use crate::{ServerError, server::ServerState, user::user_view};

/// Starts a registration. 202 means the pending row exists AND the
/// verification mail was accepted by the mail collaborator.
pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .register(
            &payload.username,
            &payload.email,
            &payload.password,
            payload.display_name.as_deref(),
        )
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn resend(
    State(state): State<ServerState>,
    Json(payload): Json<ResendRequest>,
) -> Result<StatusCode, ServerError> {
    state.engine.resend_code(&payload.email).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn verify(
    State(state): State<ServerState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ServerError> {
    let (user, token) = state.engine.verify(&payload.email, &payload.code).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: user_view(&user),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ServerError> {
    let (user, token) = state
        .engine
        .login(&payload.username, &payload.password)
        .await?;
    Ok(Json(SessionResponse {
        user: user_view(&user),
        token,
    }))
}

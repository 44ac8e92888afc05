//! Draft endpoints: save, view, list, delete, editor management.

use api_types::draft::{
    DraftListResponse, DraftSave, DraftSaved, DraftView, EditorAdd, EditorsResponse,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn draft_view(draft: &engine::Draft) -> DraftView {
    DraftView {
        id: draft.id,
        owner_id: draft.owner_id.clone(),
        name: draft.name.clone(),
        state: draft.state.clone(),
        public: draft.public,
        revision: draft.revision,
        editors: draft.editors.clone(),
        created_at: draft.created_at,
        updated_at: draft.updated_at,
    }
}

pub async fn save(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<DraftSave>,
) -> Result<Json<DraftSaved>, ServerError> {
    let (id, revision) = state
        .engine
        .save_draft(
            payload.id,
            &payload.name,
            &payload.state,
            payload.public,
            payload.expected_revision,
            &user.id,
        )
        .await?;
    Ok(Json(DraftSaved { id, revision }))
}

/// Draft view; runs under optional auth so anonymous callers can reach
/// public drafts.
pub async fn get_draft(
    user: Option<Extension<engine::users::Model>>,
    State(state): State<ServerState>,
    Path(draft_id): Path<Uuid>,
) -> Result<Json<DraftView>, ServerError> {
    let actor = user.as_ref().map(|Extension(user)| user.id.as_str());
    let draft = state.engine.draft(draft_id, actor).await?;
    Ok(Json(draft_view(&draft)))
}

pub async fn list(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<DraftListResponse>, ServerError> {
    let (mine, shared) = state.engine.list_drafts(&user.id).await?;
    Ok(Json(DraftListResponse {
        mine: mine.iter().map(draft_view).collect(),
        shared_with_me: shared.iter().map(draft_view).collect(),
    }))
}

/// Shares the optional-auth path with `get_draft`, so the user check
/// happens here instead of in the middleware.
pub async fn delete_draft(
    user: Option<Extension<engine::users::Model>>,
    State(state): State<ServerState>,
    Path(draft_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    let Some(Extension(user)) = user else {
        return Err(ServerError::Engine(engine::EngineError::Forbidden(
            "authentication required".to_string(),
        )));
    };
    state.engine.delete_draft(draft_id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_editors(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path(draft_id): Path<Uuid>,
) -> Result<Json<EditorsResponse>, ServerError> {
    let editors = state.engine.list_draft_editors(draft_id, &user.id).await?;
    Ok(Json(EditorsResponse { editors }))
}

pub async fn add_editor(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path(draft_id): Path<Uuid>,
    Json(payload): Json<EditorAdd>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .add_draft_editor(draft_id, &payload.username, &user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_editor(
    Extension(user): Extension<engine::users::Model>,
    State(state): State<ServerState>,
    Path((draft_id, username)): Path<(Uuid, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .remove_draft_editor(draft_id, &username, &user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

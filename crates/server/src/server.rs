use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post, put},
};
use axum_extra::headers::{
    Authorization, HeaderMapExt,
    authorization::{Basic, Bearer},
};
use sea_orm::DatabaseConnection;

use std::sync::Arc;

use crate::{admin, drafts, entitlements, plans, registration, user};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
}

/// Resolves the caller from an `Authorization` header: a Bearer session
/// token first, then Basic credentials. `Ok(None)` means no header at all;
/// a header that is present but wrong is always an error.
async fn resolve_user(
    state: &ServerState,
    headers: &HeaderMap,
) -> Result<Option<engine::users::Model>, StatusCode> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        let user = state
            .engine
            .session_user(bearer.token())
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?;
        return match user {
            Some(user) => Ok(Some(user)),
            None => Err(StatusCode::UNAUTHORIZED),
        };
    }

    if let Some(basic) = headers.typed_get::<Authorization<Basic>>() {
        if basic.username().is_empty() || basic.password().is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }
        return state
            .engine
            .verify_credentials(basic.username(), basic.password())
            .await
            .map(Some)
            .map_err(|_| StatusCode::UNAUTHORIZED);
    }

    if headers.contains_key(header::AUTHORIZATION) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(None)
}

/// Required auth: a Bearer session token or Basic credentials.
async fn auth(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(user) = resolve_user(&state, request.headers()).await? else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Optional auth for routes anonymous callers may reach (public draft
/// views). Presented-but-invalid credentials still fail.
async fn auth_optional(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(user) = resolve_user(&state, request.headers()).await? {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

fn router(state: ServerState) -> Router {
    let public = Router::new()
        .route("/register", post(registration::register))
        .route("/register/resend", post(registration::resend))
        .route("/register/verify", post(registration::verify))
        .route("/login", post(registration::login));

    // Draft views are reachable anonymously; the engine decides per draft.
    // Delete shares the path and checks for a user itself.
    let draft_views = Router::new()
        .route(
            "/drafts/{id}",
            get(drafts::get_draft).delete(drafts::delete_draft),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_optional));

    let authed = Router::new()
        .route("/entitlements", get(entitlements::get_entitlements))
        .route("/plans", get(plans::list))
        .route("/plan/upgrade", post(plans::upgrade))
        .route(
            "/user",
            get(user::get_profile)
                .patch(user::update_profile)
                .delete(user::delete_account),
        )
        .route("/logout", post(user::logout))
        .route("/drafts", get(drafts::list).post(drafts::save))
        .route(
            "/drafts/{id}/editors",
            get(drafts::list_editors).post(drafts::add_editor),
        )
        .route(
            "/drafts/{id}/editors/{username}",
            delete(drafts::remove_editor),
        )
        .route("/admin/plans", post(admin::create_plan))
        .route("/admin/plans/{id}/stickers", put(admin::set_plan_stickers))
        .route("/admin/plans/{id}/features", put(admin::set_plan_feature))
        .route("/admin/users/{id}/stickers", post(admin::grant_sticker))
        .route(
            "/admin/users/{id}/stickers/{sticker_id}",
            delete(admin::revoke_sticker),
        )
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route("/admin/users/{id}/role", patch(admin::set_role))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    Router::new()
        .merge(public)
        .merge(draft_views)
        .merge(authed)
        .with_state(state)
}

/// Builds the full application router. Used by the runners below and by
/// tests driving the service directly.
pub fn app(engine: Engine, db: DatabaseConnection) -> Router {
    router(ServerState {
        engine: Arc::new(engine),
        db,
    })
}

pub async fn run(engine: Engine, db: DatabaseConnection) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, db, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
        db,
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use engine::MemoryMailer;
use migration::MigratorTrait;

async fn test_app() -> (Router, Arc<MemoryMailer>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let mailer = Arc::new(MemoryMailer::new());
    let engine = engine::Engine::builder()
        .database(db.clone())
        .mailer(mailer.clone())
        .build()
        .await
        .unwrap();
    (server::app(engine, db), mailer)
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn register_verify_upgrade_and_draft_flow() {
    let (app, mailer) = test_app().await;

    let (status, _) = request(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "password123",
            "display_name": "Alice",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // A second attempt while the first is pending conflicts.
    let (status, _) = request(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "password123",
            "display_name": null,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let code = mailer.last_code_for("alice@example.com").unwrap();
    let wrong = if code == "1234" { "4321" } else { "1234" };
    let (status, _) = request(
        &app,
        "POST",
        "/register/verify",
        None,
        Some(json!({"email": "alice@example.com", "code": wrong})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, session) = request(
        &app,
        "POST",
        "/register/verify",
        None,
        Some(json!({"email": "alice@example.com", "code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = session["token"].as_str().unwrap().to_string();
    assert_eq!(session["user"]["username"], "alice");
    assert_eq!(session["user"]["email_verified"], true);

    // Entitlements need auth.
    let (status, _) = request(&app, "GET", "/entitlements", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, entitlements) =
        request(&app, "GET", "/entitlements", Some(&bearer(&token)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entitlements["role"], "free");
    assert_eq!(entitlements["plan"], "Basic");

    // Basic credentials hit the argon2 path.
    let (status, profile) = request(
        &app,
        "GET",
        "/user",
        Some(&basic("alice", "password123")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");

    let (status, _) = request(
        &app,
        "GET",
        "/user",
        Some(&basic("alice", "wrong-password")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A free plan cannot save drafts.
    let (status, _) = request(
        &app,
        "POST",
        "/drafts",
        Some(&bearer(&token)),
        Some(json!({
            "id": null,
            "name": "Wall",
            "state": "{}",
            "public": false,
            "expected_revision": null,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Upgrade to Advanced and retry.
    let (status, plans) = request(&app, "GET", "/plans", Some(&bearer(&token)), None).await;
    assert_eq!(status, StatusCode::OK);
    let advanced_id = plans["plans"]
        .as_array()
        .unwrap()
        .iter()
        .find(|plan| plan["name"] == "Advanced")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = request(
        &app,
        "POST",
        "/plan/upgrade",
        Some(&bearer(&token)),
        Some(json!({"plan_id": advanced_id})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, saved) = request(
        &app,
        "POST",
        "/drafts",
        Some(&bearer(&token)),
        Some(json!({
            "id": null,
            "name": "Wall",
            "state": "{}",
            "public": false,
            "expected_revision": null,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let draft_id = saved["id"].as_str().unwrap().to_string();
    assert_eq!(saved["revision"], 1);

    // Anonymous callers cannot see a private draft.
    let (status, _) = request(&app, "GET", &format!("/drafts/{draft_id}"), None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // After publishing, anonymous view works.
    let (status, _) = request(
        &app,
        "POST",
        "/drafts",
        Some(&bearer(&token)),
        Some(json!({
            "id": draft_id,
            "name": "Wall",
            "state": "{}",
            "public": true,
            "expected_revision": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, draft) =
        request(&app, "GET", &format!("/drafts/{draft_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(draft["public"], true);
    assert_eq!(draft["revision"], 2);

    // A stale save conflicts.
    let (status, _) = request(
        &app,
        "POST",
        "/drafts",
        Some(&bearer(&token)),
        Some(json!({
            "id": draft_id,
            "name": "Wall",
            "state": "{}",
            "public": true,
            "expected_revision": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Logout revokes the session token.
    let (status, _) = request(&app, "POST", "/logout", Some(&bearer(&token)), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = request(&app, "GET", "/entitlements", Some(&bearer(&token)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn editor_endpoints_enforce_ownership_and_existence() {
    let (app, mailer) = test_app().await;

    for (username, email) in [("alice", "alice@example.com"), ("bob", "bob@example.com")] {
        let (status, _) = request(
            &app,
            "POST",
            "/register",
            None,
            Some(json!({
                "username": username,
                "email": email,
                "password": "password123",
                "display_name": null,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let code = mailer.last_code_for(email).unwrap();
        let (status, _) = request(
            &app,
            "POST",
            "/register/verify",
            None,
            Some(json!({"email": email, "code": code})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, session) = request(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "alice", "password": "password123"})),
    )
    .await;
    let alice_token = session["token"].as_str().unwrap().to_string();

    // Put alice on Advanced so she can create a draft.
    let (_, plans) = request(&app, "GET", "/plans", Some(&bearer(&alice_token)), None).await;
    let advanced_id = plans["plans"]
        .as_array()
        .unwrap()
        .iter()
        .find(|plan| plan["name"] == "Advanced")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    request(
        &app,
        "POST",
        "/plan/upgrade",
        Some(&bearer(&alice_token)),
        Some(json!({"plan_id": advanced_id})),
    )
    .await;

    let (_, saved) = request(
        &app,
        "POST",
        "/drafts",
        Some(&bearer(&alice_token)),
        Some(json!({
            "id": null,
            "name": "Wall",
            "state": "{}",
            "public": false,
            "expected_revision": null,
        })),
    )
    .await;
    let draft_id = saved["id"].as_str().unwrap().to_string();

    // Unknown editor target → 404.
    let (status, _) = request(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/editors"),
        Some(&bearer(&alice_token)),
        Some(json!({"username": "nobody"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/editors"),
        Some(&bearer(&alice_token)),
        Some(json!({"username": "bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Bob (not the owner) cannot manage editors.
    let (_, session) = request(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "bob", "password": "password123"})),
    )
    .await;
    let bob_token = session["token"].as_str().unwrap().to_string();
    let (status, _) = request(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/editors"),
        Some(&bearer(&bob_token)),
        Some(json!({"username": "bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // But bob can view the shared draft.
    let (status, _) = request(
        &app,
        "GET",
        &format!("/drafts/{draft_id}"),
        Some(&bearer(&bob_token)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, editors) = request(
        &app,
        "GET",
        &format!("/drafts/{draft_id}/editors"),
        Some(&bearer(&alice_token)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(editors["editors"], json!(["bob"]));
}

#[tokio::test]
async fn admin_routes_are_admin_only() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let mailer = Arc::new(MemoryMailer::new());
    let engine = engine::Engine::builder()
        .database(db.clone())
        .mailer(mailer.clone())
        .build()
        .await
        .unwrap();

    engine
        .create_verified_user("root", "root@example.com", "admin-password", engine::Role::Admin)
        .await
        .unwrap();
    let premium_id = engine
        .list_plans()
        .await
        .unwrap()
        .into_iter()
        .find(|plan| plan.name == "Premium")
        .unwrap()
        .id;
    let app = server::app(engine, db);

    let (status, updated) = request(
        &app,
        "PUT",
        &format!("/admin/plans/{premium_id}/stickers"),
        Some(&basic("root", "admin-password")),
        Some(json!({"sticker_ids": ["gold", "silver"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["affected_user_count"], 0);
    assert_eq!(updated["failed_user_count"], 0);

    // A regular user is rejected by the engine's admin check.
    let (status, _) = request(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "uma",
            "email": "uma@example.com",
            "password": "password123",
            "display_name": null,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let code = mailer.last_code_for("uma@example.com").unwrap();
    let (_, session) = request(
        &app,
        "POST",
        "/register/verify",
        None,
        Some(json!({"email": "uma@example.com", "code": code})),
    )
    .await;
    let token = session["token"].as_str().unwrap().to_string();

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/admin/plans/{premium_id}/stickers"),
        Some(&bearer(&token)),
        Some(json!({"sticker_ids": []})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ActiveValue, Database, DatabaseConnection, EntityTrait, PaginatorTrait};

use engine::{Engine, EngineError, MemoryMailer, Role};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, Arc<MemoryMailer>, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let mailer = Arc::new(MemoryMailer::new());
    let engine = Engine::builder()
        .database(db.clone())
        .mailer(mailer.clone())
        .build()
        .await
        .unwrap();
    (engine, mailer, db)
}

#[tokio::test]
async fn register_creates_pending_and_sends_mail() {
    let (engine, mailer, db) = engine_with_db().await;

    engine
        .register("alice", "alice@example.com", "password123", Some("Alice"))
        .await
        .unwrap();

    assert_eq!(mailer.sent_count(), 1);
    let code = mailer.last_code_for("alice@example.com").unwrap();
    assert_eq!(code.len(), 4);

    let pending = engine::pending_registrations::Entity::find_by_id(
        "alice@example.com".to_string(),
    )
    .one(&db)
    .await
    .unwrap()
    .unwrap();
    assert_eq!(pending.username, "alice");
    assert_eq!(pending.code, code);
    // No verified user yet.
    assert_eq!(
        engine::users::Entity::find().count(&db).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn register_rejects_pending_duplicate() {
    let (engine, _mailer, _db) = engine_with_db().await;

    engine
        .register("alice", "alice@example.com", "password123", None)
        .await
        .unwrap();

    // Same email.
    let err = engine
        .register("alice2", "alice@example.com", "password123", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    // Same username, different email.
    let err = engine
        .register("alice", "other@example.com", "password123", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn register_rejects_verified_duplicate() {
    let (engine, mailer, _db) = engine_with_db().await;

    engine
        .register("alice", "alice@example.com", "password123", None)
        .await
        .unwrap();
    let code = mailer.last_code_for("alice@example.com").unwrap();
    engine.verify("alice@example.com", &code).await.unwrap();

    let err = engine
        .register("alice", "alice@example.com", "password123", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn mail_failure_rolls_back_pending_row() {
    let (engine, mailer, db) = engine_with_db().await;
    mailer.set_fail(true);

    let err = engine
        .register("alice", "alice@example.com", "password123", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Mail(_)));

    // The pending row must not survive a failed send: the caller was never
    // told "sent".
    assert_eq!(
        engine::pending_registrations::Entity::find()
            .count(&db)
            .await
            .unwrap(),
        0
    );

    // Retrying once the mailer recovers works from scratch.
    mailer.set_fail(false);
    engine
        .register("alice", "alice@example.com", "password123", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn verify_with_wrong_code_never_promotes() {
    let (engine, mailer, db) = engine_with_db().await;

    engine
        .register("alice", "alice@example.com", "password123", None)
        .await
        .unwrap();
    let code = mailer.last_code_for("alice@example.com").unwrap();
    let wrong = if code == "1234" { "4321" } else { "1234" };

    let err = engine
        .verify("alice@example.com", wrong)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCode(_)));

    // Pending row still there, no user created.
    assert_eq!(
        engine::pending_registrations::Entity::find()
            .count(&db)
            .await
            .unwrap(),
        1
    );
    assert_eq!(engine::users::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn resend_invalidates_old_code() {
    let (engine, mailer, _db) = engine_with_db().await;

    engine
        .register("ygor", "a@b.com", "password123", None)
        .await
        .unwrap();
    let old_code = mailer.last_code_for("a@b.com").unwrap();

    engine.resend_code("a@b.com").await.unwrap();
    let mut new_code = mailer.last_code_for("a@b.com").unwrap();
    // Codes are random; regenerate until it actually differs.
    while new_code == old_code {
        engine.resend_code("a@b.com").await.unwrap();
        new_code = mailer.last_code_for("a@b.com").unwrap();
    }

    let err = engine.verify("a@b.com", &old_code).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidCode(_)));

    let (user, _token) = engine.verify("a@b.com", &new_code).await.unwrap();
    assert_eq!(user.username, "ygor");
}

#[tokio::test]
async fn resend_without_pending_is_not_found() {
    let (engine, _mailer, _db) = engine_with_db().await;
    let err = engine.resend_code("ghost@example.com").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn verify_promotes_exactly_once() {
    let (engine, mailer, db) = engine_with_db().await;

    engine
        .register("alice", "alice@example.com", "password123", None)
        .await
        .unwrap();
    let code = mailer.last_code_for("alice@example.com").unwrap();
    let (user, token) = engine.verify("alice@example.com", &code).await.unwrap();

    assert_eq!(user.username, "alice");
    assert!(user.email_verified);
    assert_eq!(user.role, Role::Free.as_str());

    // Never both a verified user and a pending row for one identity.
    assert_eq!(
        engine::pending_registrations::Entity::find()
            .count(&db)
            .await
            .unwrap(),
        0
    );
    assert_eq!(engine::users::Entity::find().count(&db).await.unwrap(), 1);

    // The issued credential resolves back to the user.
    let session_user = engine.session_user(&token).await.unwrap().unwrap();
    assert_eq!(session_user.id, user.id);

    // The code is spent.
    let err = engine
        .verify("alice@example.com", &code)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCode(_)));
}

#[tokio::test]
async fn verify_against_existing_user_cleans_pending() {
    let (engine, mailer, db) = engine_with_db().await;

    engine
        .register("alice", "alice@example.com", "password123", None)
        .await
        .unwrap();
    let code = mailer.last_code_for("alice@example.com").unwrap();
    engine.verify("alice@example.com", &code).await.unwrap();

    // Simulate the double-submit race: a stale pending row for the same
    // username appears after the user was verified.
    let stale = engine::pending_registrations::ActiveModel {
        email: ActiveValue::Set("alice@other.com".to_string()),
        username: ActiveValue::Set("alice".to_string()),
        password_hash: ActiveValue::Set("unused".to_string()),
        display_name: ActiveValue::Set(None),
        code: ActiveValue::Set("9999".to_string()),
        created_at: ActiveValue::Set(Utc::now()),
    };
    engine::pending_registrations::Entity::insert(stale)
        .exec(&db)
        .await
        .unwrap();

    let err = engine.verify("alice@other.com", "9999").await.unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    // The stale row was cleaned up even though the call failed.
    assert_eq!(
        engine::pending_registrations::Entity::find()
            .count(&db)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn configured_ttl_expires_codes() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let mailer = Arc::new(MemoryMailer::new());
    let engine = Engine::builder()
        .database(db.clone())
        .mailer(mailer.clone())
        .code_ttl(Some(std::time::Duration::from_secs(3600)))
        .build()
        .await
        .unwrap();

    // A pending row created two hours ago.
    let stale = engine::pending_registrations::ActiveModel {
        email: ActiveValue::Set("old@example.com".to_string()),
        username: ActiveValue::Set("old".to_string()),
        password_hash: ActiveValue::Set("unused".to_string()),
        display_name: ActiveValue::Set(None),
        code: ActiveValue::Set("1111".to_string()),
        created_at: ActiveValue::Set(Utc::now() - ChronoDuration::hours(2)),
    };
    engine::pending_registrations::Entity::insert(stale)
        .exec(&db)
        .await
        .unwrap();

    let err = engine.verify("old@example.com", "1111").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidCode(_)));

    // A resend refreshes the code and makes verification possible again.
    engine.resend_code("old@example.com").await.unwrap();
    let code = mailer.last_code_for("old@example.com").unwrap();
    engine.verify("old@example.com", &code).await.unwrap();
}

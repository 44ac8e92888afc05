use std::sync::Arc;

use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use engine::{Engine, EngineError, FeatureKey, FeatureValue, MemoryMailer, Role};
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

async fn admin_user(engine: &Engine) -> engine::users::Model {
    engine
        .create_verified_user("root", "root@example.com", "admin-password", Role::Admin)
        .await
        .unwrap()
}

async fn verified_user(
    engine: &Engine,
    mailer: &MemoryMailer,
    username: &str,
    email: &str,
) -> engine::users::Model {
    engine
        .register(username, email, "password123", None)
        .await
        .unwrap();
    let code = mailer.last_code_for(email).unwrap();
    let (user, _token) = engine.verify(email, &code).await.unwrap();
    user
}

async fn plan_id(engine: &Engine, name: &str) -> Uuid {
    engine
        .list_plans()
        .await
        .unwrap()
        .into_iter()
        .find(|plan| plan.name == name)
        .unwrap()
        .id
}

/// Persisted sticker grants, sorted.
async fn sticker_rows(db: &DatabaseConnection, user_id: &str) -> Vec<String> {
    let mut rows: Vec<String> = engine::user_stickers::Entity::find()
        .filter(engine::user_stickers::Column::UserId.eq(user_id.to_string()))
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.sticker_id)
        .collect();
    rows.sort();
    rows
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn premium_redefinition_scenario() {
    let (engine, mailer, db) = engine_with_db().await;
    let admin = admin_user(&engine).await;
    let premium = plan_id(&engine, "Premium").await;

    // Premium = {A, B}; X subscribes; X also holds C individually.
    engine
        .redefine_plan_stickers(premium, &ids(&["sticker-a", "sticker-b"]), &admin.id)
        .await
        .unwrap();
    let x = verified_user(&engine, &mailer, "xavier", "x@example.com").await;
    engine.change_subscription(&x.id, premium).await.unwrap();
    engine
        .grant_user_sticker(&x.id, "sticker-c", &admin.id)
        .await
        .unwrap();
    assert_eq!(
        sticker_rows(&db, &x.id).await,
        ids(&["sticker-a", "sticker-b", "sticker-c"])
    );

    // Admin redefines Premium to {B, D}: A removed, C untouched, B kept,
    // D added.
    let report = engine
        .redefine_plan_stickers(premium, &ids(&["sticker-b", "sticker-d"]), &admin.id)
        .await
        .unwrap();
    assert_eq!(report.affected_users, 1);
    assert_eq!(report.failed_users, 0);
    assert_eq!(
        sticker_rows(&db, &x.id).await,
        ids(&["sticker-b", "sticker-c", "sticker-d"])
    );

    // The read-time union agrees with the persisted grants.
    let entitlements = engine.entitlements(&x.id).await.unwrap();
    assert_eq!(
        entitlements.stickers,
        ids(&["sticker-b", "sticker-c", "sticker-d"])
    );
}

#[tokio::test]
async fn redefinition_is_idempotent() {
    let (engine, mailer, db) = engine_with_db().await;
    let admin = admin_user(&engine).await;
    let premium = plan_id(&engine, "Premium").await;

    let x = verified_user(&engine, &mailer, "xavier", "x@example.com").await;
    engine.change_subscription(&x.id, premium).await.unwrap();

    let set = ids(&["sticker-a", "sticker-b"]);
    engine
        .redefine_plan_stickers(premium, &set, &admin.id)
        .await
        .unwrap();
    let after_first = sticker_rows(&db, &x.id).await;

    engine
        .redefine_plan_stickers(premium, &set, &admin.id)
        .await
        .unwrap();
    assert_eq!(sticker_rows(&db, &x.id).await, after_first);
}

#[tokio::test]
async fn individual_grants_survive_unrelated_redefinitions() {
    let (engine, mailer, db) = engine_with_db().await;
    let admin = admin_user(&engine).await;
    let advanced = plan_id(&engine, "Advanced").await;
    let premium = plan_id(&engine, "Premium").await;

    let y = verified_user(&engine, &mailer, "yara", "y@example.com").await;
    engine.change_subscription(&y.id, advanced).await.unwrap();
    engine
        .grant_user_sticker(&y.id, "indie", &admin.id)
        .await
        .unwrap();

    // Redefinitions of a plan Y is not subscribed to, even ones that
    // mention the sticker, never touch Y.
    engine
        .redefine_plan_stickers(premium, &ids(&["indie", "gold"]), &admin.id)
        .await
        .unwrap();
    engine
        .redefine_plan_stickers(premium, &ids(&["gold"]), &admin.id)
        .await
        .unwrap();
    assert!(sticker_rows(&db, &y.id).await.contains(&"indie".to_string()));

    // Redefinitions of Y's own plan that never included the sticker leave
    // it alone too.
    engine
        .redefine_plan_stickers(advanced, &ids(&["silver"]), &admin.id)
        .await
        .unwrap();
    engine
        .redefine_plan_stickers(advanced, &ids(&["bronze"]), &admin.id)
        .await
        .unwrap();
    assert!(sticker_rows(&db, &y.id).await.contains(&"indie".to_string()));
}

#[tokio::test]
async fn plan_change_is_additive_only() {
    let (engine, mailer, db) = engine_with_db().await;
    let admin = admin_user(&engine).await;
    let basic = plan_id(&engine, "Basic").await;
    let premium = plan_id(&engine, "Premium").await;

    engine
        .redefine_plan_stickers(basic, &ids(&["welcome"]), &admin.id)
        .await
        .unwrap();
    engine
        .redefine_plan_stickers(premium, &ids(&["pro"]), &admin.id)
        .await
        .unwrap();

    // Verification grants the default plan's stickers.
    let u = verified_user(&engine, &mailer, "uma", "u@example.com").await;
    assert_eq!(sticker_rows(&db, &u.id).await, ids(&["welcome"]));

    // Upgrade adds the premium sticker and derives the role.
    engine.change_subscription(&u.id, premium).await.unwrap();
    assert_eq!(sticker_rows(&db, &u.id).await, ids(&["pro", "welcome"]));
    let user = engine.user(&u.id).await.unwrap();
    assert_eq!(user.role, Role::Premium.as_str());

    // Downgrade keeps the previous plan's stickers; only the admin
    // redefinition path removes plan-granted ones.
    engine.change_subscription(&u.id, basic).await.unwrap();
    assert_eq!(sticker_rows(&db, &u.id).await, ids(&["pro", "welcome"]));
    let user = engine.user(&u.id).await.unwrap();
    assert_eq!(user.role, Role::Free.as_str());
}

#[tokio::test]
async fn redefinition_covers_every_subscriber() {
    let (engine, mailer, db) = engine_with_db().await;
    let admin = admin_user(&engine).await;
    let premium = plan_id(&engine, "Premium").await;

    let x = verified_user(&engine, &mailer, "xavier", "x@example.com").await;
    let y = verified_user(&engine, &mailer, "yara", "y@example.com").await;
    engine.change_subscription(&x.id, premium).await.unwrap();
    engine.change_subscription(&y.id, premium).await.unwrap();

    let report = engine
        .redefine_plan_stickers(premium, &ids(&["gold"]), &admin.id)
        .await
        .unwrap();
    assert_eq!(report.affected_users, 2);
    assert_eq!(report.failed_users, 0);
    assert_eq!(sticker_rows(&db, &x.id).await, ids(&["gold"]));
    assert_eq!(sticker_rows(&db, &y.id).await, ids(&["gold"]));
}

#[tokio::test]
async fn redefinition_is_admin_only() {
    let (engine, mailer, _db) = engine_with_db().await;
    let premium = plan_id(&engine, "Premium").await;

    let u = verified_user(&engine, &mailer, "uma", "u@example.com").await;
    let err = engine
        .redefine_plan_stickers(premium, &ids(&["gold"]), &u.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .grant_user_sticker(&u.id, "gold", &u.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn entitlements_fall_back_to_role_plan() {
    let (engine, mailer, _db) = engine_with_db().await;

    // No subscription row: a free user resolves to the Basic plan with
    // typed features.
    let u = verified_user(&engine, &mailer, "uma", "u@example.com").await;
    let entitlements = engine.entitlements(&u.id).await.unwrap();
    assert_eq!(entitlements.role, Role::Free);
    assert_eq!(entitlements.plan.name, "Basic");

    let limit = entitlements
        .plan
        .features
        .iter()
        .find(|feature| feature.key == FeatureKey::DraftsLimit)
        .unwrap();
    assert_eq!(limit.value, FeatureValue::Int(1));
    let share = entitlements
        .plan
        .features
        .iter()
        .find(|feature| feature.key == FeatureKey::Share)
        .unwrap();
    assert_eq!(share.value, FeatureValue::Bool(false));
}

#[tokio::test]
async fn revoked_plan_sticker_stays_effective_through_union() {
    let (engine, mailer, db) = engine_with_db().await;
    let admin = admin_user(&engine).await;
    let premium = plan_id(&engine, "Premium").await;

    engine
        .redefine_plan_stickers(premium, &ids(&["gold"]), &admin.id)
        .await
        .unwrap();
    let x = verified_user(&engine, &mailer, "xavier", "x@example.com").await;
    engine.change_subscription(&x.id, premium).await.unwrap();

    // An admin revokes the row, but the plan still lists the sticker: the
    // read-time union keeps it effective.
    engine
        .revoke_user_sticker(&x.id, "gold", &admin.id)
        .await
        .unwrap();
    assert_eq!(sticker_rows(&db, &x.id).await, Vec::<String>::new());
    let entitlements = engine.entitlements(&x.id).await.unwrap();
    assert_eq!(entitlements.stickers, ids(&["gold"]));
}

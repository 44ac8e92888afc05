use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Role, plan_stickers, plans, subscriptions, user_stickers, users,
};

use super::{Engine, normalize_required_name, with_tx};

/// Outcome of a plan redefinition.
///
/// The plan-definition write is the primary operation; subscriber counts
/// report how the secondary propagation went.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub affected_users: u64,
    pub failed_users: u64,
}

impl Engine {
    /// Insert-if-missing: a sticker the user already holds is neither
    /// duplicated nor an error.
    async fn upsert_user_sticker(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        sticker_id: &str,
    ) -> ResultEngine<()> {
        let exists = user_stickers::Entity::find_by_id((user_id.to_string(), sticker_id.to_string()))
            .one(db)
            .await?
            .is_some();
        if !exists {
            let row = user_stickers::ActiveModel {
                user_id: ActiveValue::Set(user_id.to_string()),
                sticker_id: ActiveValue::Set(sticker_id.to_string()),
            };
            row.insert(db).await?;
        }
        Ok(())
    }

    /// Replaces a plan's sticker set and propagates the change to every
    /// subscriber (admin-only).
    ///
    /// The old definition is captured in the same transaction that replaces
    /// it; per subscriber, exactly the stickers in old \ new are removed and
    /// the new set is upserted. Stickers that were never part of the old
    /// definition (purely individual grants) are not removal candidates.
    /// Each subscriber reconciles in its own transaction: one failure is
    /// logged and counted, and never undoes the plan write or the other
    /// subscribers.
    pub async fn redefine_plan_stickers(
        &self,
        plan_id: Uuid,
        sticker_ids: &[String],
        user_id: &str,
    ) -> ResultEngine<ReconciliationReport> {
        let new_set: BTreeSet<String> = sticker_ids
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let (removed, subscribers) = with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, user_id).await?;
            plans::Entity::find_by_id(plan_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("plan not exists".to_string()))?;

            let old_rows = plan_stickers::Entity::find()
                .filter(plan_stickers::Column::PlanId.eq(plan_id.to_string()))
                .all(&db_tx)
                .await?;
            let old_set: BTreeSet<String> =
                old_rows.into_iter().map(|row| row.sticker_id).collect();

            // Wholesale replace: delete-all-then-insert.
            plan_stickers::Entity::delete_many()
                .filter(plan_stickers::Column::PlanId.eq(plan_id.to_string()))
                .exec(&db_tx)
                .await?;
            for sticker_id in &new_set {
                let row = plan_stickers::ActiveModel {
                    plan_id: ActiveValue::Set(plan_id.to_string()),
                    sticker_id: ActiveValue::Set(sticker_id.clone()),
                };
                row.insert(&db_tx).await?;
            }

            let subscribers: Vec<String> = subscriptions::Entity::find()
                .filter(subscriptions::Column::PlanId.eq(plan_id.to_string()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|row| row.user_id)
                .collect();

            let removed: Vec<String> = old_set.difference(&new_set).cloned().collect();
            Ok((removed, subscribers))
        })?;

        let granted: Vec<String> = new_set.into_iter().collect();
        let mut affected_users = 0;
        let mut failed_users = 0;
        for subscriber in subscribers {
            match self
                .reconcile_user_stickers(&subscriber, &removed, &granted)
                .await
            {
                Ok(()) => affected_users += 1,
                Err(err) => {
                    failed_users += 1;
                    tracing::warn!(
                        user_id = %subscriber,
                        error = %err,
                        "sticker reconciliation failed for subscriber"
                    );
                }
            }
        }

        Ok(ReconciliationReport {
            affected_users,
            failed_users,
        })
    }

    /// One subscriber's reconciliation, scoped to its own transaction so
    /// concurrent runs degrade to last-write-wins per user.
    async fn reconcile_user_stickers(
        &self,
        user_id: &str,
        removed: &[String],
        granted: &[String],
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            if !removed.is_empty() {
                user_stickers::Entity::delete_many()
                    .filter(user_stickers::Column::UserId.eq(user_id.to_string()))
                    .filter(user_stickers::Column::StickerId.is_in(removed.iter().cloned()))
                    .exec(&db_tx)
                    .await?;
            }
            for sticker_id in granted {
                self.upsert_user_sticker(&db_tx, user_id, sticker_id).await?;
            }
            Ok(())
        })
    }

    /// Additive grant of a plan's stickers; nothing is removed.
    pub(super) async fn grant_plan_stickers(
        &self,
        plan_db_id: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let rows = plan_stickers::Entity::find()
                .filter(plan_stickers::Column::PlanId.eq(plan_db_id.to_string()))
                .all(&db_tx)
                .await?;
            for row in rows {
                self.upsert_user_sticker(&db_tx, user_id, &row.sticker_id)
                    .await?;
            }
            Ok(())
        })
    }

    pub(super) async fn grant_default_plan_stickers(&self, user_id: &str) -> ResultEngine<()> {
        let plan_db_id = with_tx!(self, |db_tx| {
            let plan = self
                .find_plan_by_name(&db_tx, crate::plans::DEFAULT_PLAN_NAME)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("plan not exists".to_string()))?;
            Ok(plan.id)
        })?;
        self.grant_plan_stickers(&plan_db_id, user_id).await
    }

    /// Moves a user onto a plan (upgrade or downgrade) and grants the new
    /// plan's stickers additively.
    ///
    /// Stickers from the previous plan are kept: only an admin redefinition
    /// ever removes plan-granted stickers.
    pub async fn change_subscription(&self, user_id: &str, plan_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let user = self.require_user_by_id(&db_tx, user_id).await?;
            let plan = plans::Entity::find_by_id(plan_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("plan not exists".to_string()))?;

            let subscription = subscriptions::ActiveModel {
                user_id: ActiveValue::Set(user.id.clone()),
                plan_id: ActiveValue::Set(plan.id.clone()),
                started_at: ActiveValue::Set(Utc::now()),
                ends_at: ActiveValue::Set(None),
            };
            // At most one subscription per user: upsert on the user_id key.
            match subscriptions::Entity::find_by_id(user.id.clone())
                .one(&db_tx)
                .await?
            {
                Some(_) => {
                    subscription.update(&db_tx).await?;
                }
                None => {
                    subscription.insert(&db_tx).await?;
                }
            }

            // Admins keep their role across plan changes.
            let current_role = Role::try_from(user.role.as_str()).unwrap_or_default();
            if !current_role.is_admin() {
                let mut active: users::ActiveModel = user.into();
                active.role =
                    ActiveValue::Set(Role::from_plan_name(&plan.name).as_str().to_string());
                active.update(&db_tx).await?;
            }
            Ok(())
        })?;

        // Secondary, best-effort: the subscription write stands even if the
        // sticker grant fails.
        if let Err(err) = self.grant_plan_stickers(&plan_id.to_string(), user_id).await {
            tracing::warn!(
                user_id = %user_id,
                error = %err,
                "failed to grant plan stickers after subscription change"
            );
        }
        Ok(())
    }

    /// Individually grants a sticker (admin-only).
    pub async fn grant_user_sticker(
        &self,
        target_user_id: &str,
        sticker_id: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let sticker_id = normalize_required_name(sticker_id, "sticker id")?;
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, user_id).await?;
            self.require_user_by_id(&db_tx, target_user_id).await?;
            self.upsert_user_sticker(&db_tx, target_user_id, &sticker_id)
                .await?;
            Ok(())
        })
    }

    /// Removes a grant (admin-only). If the user's plan still lists the
    /// sticker it stays effective through the read-time union.
    pub async fn revoke_user_sticker(
        &self,
        target_user_id: &str,
        sticker_id: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, user_id).await?;
            self.require_user_by_id(&db_tx, target_user_id).await?;
            user_stickers::Entity::delete_by_id((
                target_user_id.to_string(),
                sticker_id.to_string(),
            ))
            .exec(&db_tx)
            .await?;
            Ok(())
        })
    }
}

use std::collections::BTreeSet;

use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, FeatureKey, FeatureValue, Plan, ResultEngine, Role, plan_features, plan_stickers,
    plans, subscriptions, user_stickers, users,
};

use super::{Engine, with_tx};

/// Everything a user is entitled to at a point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    pub role: Role,
    pub plan: Plan,
    /// Effective sticker set: individual grants ∪ current plan's stickers,
    /// deduplicated and sorted.
    pub stickers: Vec<String>,
}

impl Engine {
    pub(super) async fn find_plan_by_name(
        &self,
        db: &DatabaseTransaction,
        name: &str,
    ) -> ResultEngine<Option<plans::Model>> {
        plans::Entity::find()
            .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// The plan entitlements are resolved against: the subscription plan if
    /// one exists, else the plan named after the user's role, else Basic.
    pub(super) async fn plan_model_for_user(
        &self,
        db: &DatabaseTransaction,
        user: &users::Model,
    ) -> ResultEngine<plans::Model> {
        if let Some(subscription) = subscriptions::Entity::find_by_id(user.id.clone())
            .one(db)
            .await?
            && let Some(plan) = plans::Entity::find_by_id(subscription.plan_id.clone())
                .one(db)
                .await?
        {
            return Ok(plan);
        }

        let role = Role::try_from(user.role.as_str()).unwrap_or_default();
        if let Some(plan) = self.find_plan_by_name(db, role.default_plan_name()).await? {
            return Ok(plan);
        }
        self.find_plan_by_name(db, crate::plans::DEFAULT_PLAN_NAME)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("plan not exists".to_string()))
    }

    pub(super) async fn ordered_features(
        &self,
        db: &DatabaseTransaction,
        plan_id: &str,
    ) -> ResultEngine<Vec<plan_features::Model>> {
        plan_features::Entity::find()
            .filter(plan_features::Column::PlanId.eq(plan_id.to_string()))
            .order_by_asc(plan_features::Column::SortOrder)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn assemble_plan(
        &self,
        db: &DatabaseTransaction,
        model: plans::Model,
    ) -> ResultEngine<Plan> {
        let features = self.ordered_features(db, &model.id).await?;
        Plan::try_from((model, features))
    }

    /// Typed value of one feature on the user's current plan, or `None` when
    /// the plan does not define it. Per-feature defaults (`share` ⇒ false,
    /// `drafts_limit` ⇒ unlimited) are applied by the call sites.
    pub(super) async fn user_feature(
        &self,
        db: &DatabaseTransaction,
        user: &users::Model,
        key: &FeatureKey,
    ) -> ResultEngine<Option<FeatureValue>> {
        let plan = self.plan_model_for_user(db, user).await?;
        let row =
            plan_features::Entity::find_by_id((plan.id.clone(), key.as_str().to_string()))
                .one(db)
                .await?;
        Ok(row.map(|row| FeatureValue::for_key(key, &row.value)))
    }

    /// Save actions require the actor's own plan to grant `share`, on top of
    /// any ownership/editorship check.
    pub(super) async fn require_share_capability(
        &self,
        db: &DatabaseTransaction,
        user: &users::Model,
    ) -> ResultEngine<()> {
        let allowed = self
            .user_feature(db, user, &FeatureKey::Share)
            .await?
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if !allowed {
            return Err(EngineError::Forbidden(
                "plan does not allow saving drafts".to_string(),
            ));
        }
        Ok(())
    }

    pub(super) async fn drafts_limit_for(
        &self,
        db: &DatabaseTransaction,
        user: &users::Model,
    ) -> ResultEngine<Option<i64>> {
        Ok(self
            .user_feature(db, user, &FeatureKey::DraftsLimit)
            .await?
            .and_then(|value| value.as_int()))
    }

    /// Read-time union of individual grants and the current plan's stickers.
    ///
    /// The reconciliation paths also persist plan stickers into
    /// `user_stickers`; both views agree on final membership.
    pub(super) async fn effective_sticker_set(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        plan_id: &str,
    ) -> ResultEngine<Vec<String>> {
        let mut stickers = BTreeSet::new();

        let granted = user_stickers::Entity::find()
            .filter(user_stickers::Column::UserId.eq(user_id.to_string()))
            .all(db)
            .await?;
        for row in granted {
            stickers.insert(row.sticker_id);
        }

        let from_plan = plan_stickers::Entity::find()
            .filter(plan_stickers::Column::PlanId.eq(plan_id.to_string()))
            .all(db)
            .await?;
        for row in from_plan {
            stickers.insert(row.sticker_id);
        }

        Ok(stickers.into_iter().collect())
    }

    /// Resolves role, current plan (with features) and the effective sticker
    /// set for a user.
    pub async fn entitlements(&self, user_id: &str) -> ResultEngine<Entitlements> {
        with_tx!(self, |db_tx| {
            let user = self.require_user_by_id(&db_tx, user_id).await?;
            let role = Role::try_from(user.role.as_str())?;
            let plan_model = self.plan_model_for_user(&db_tx, &user).await?;
            let stickers = self
                .effective_sticker_set(&db_tx, &user.id, &plan_model.id)
                .await?;
            let plan = self.assemble_plan(&db_tx, plan_model).await?;
            Ok(Entitlements {
                role,
                plan,
                stickers,
            })
        })
    }
}

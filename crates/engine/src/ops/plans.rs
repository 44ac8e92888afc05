use sea_orm::{ActiveValue, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, Plan, ResultEngine, plan_features, plans};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Lists the plan catalog in display order, features included.
    pub async fn list_plans(&self) -> ResultEngine<Vec<Plan>> {
        with_tx!(self, |db_tx| {
            let models = plans::Entity::find()
                .order_by_asc(plans::Column::DisplayOrder)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                out.push(self.assemble_plan(&db_tx, model).await?);
            }
            Ok(out)
        })
    }

    /// Returns one plan with its ordered features.
    pub async fn plan(&self, plan_id: Uuid) -> ResultEngine<Plan> {
        with_tx!(self, |db_tx| {
            let model = plans::Entity::find_by_id(plan_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("plan not exists".to_string()))?;
            self.assemble_plan(&db_tx, model).await
        })
    }

    /// Adds a plan to the catalog (admin-only). Names stay unique
    /// case-insensitively so role fallback lookups are unambiguous.
    pub async fn create_plan(
        &self,
        name: &str,
        price_cents: i64,
        display_order: i32,
        user_id: &str,
    ) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "plan name")?;
        let plan_id = Uuid::new_v4();

        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, user_id).await?;
            if self.find_plan_by_name(&db_tx, &name).await?.is_some() {
                return Err(EngineError::ExistingKey(name));
            }

            let plan = plans::ActiveModel {
                id: ActiveValue::Set(plan_id.to_string()),
                name: ActiveValue::Set(name.clone()),
                price_cents: ActiveValue::Set(price_cents),
                display_order: ActiveValue::Set(display_order),
            };
            plan.insert(&db_tx).await?;
            Ok(plan_id)
        })
    }

    /// Adds or updates one feature row on a plan (admin-only).
    pub async fn set_plan_feature(
        &self,
        plan_id: Uuid,
        key: &str,
        value: &str,
        label: Option<&str>,
        sort_order: i32,
        user_id: &str,
    ) -> ResultEngine<()> {
        let key = normalize_required_name(key, "feature key")?;

        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, user_id).await?;
            plans::Entity::find_by_id(plan_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("plan not exists".to_string()))?;

            let active = plan_features::ActiveModel {
                plan_id: ActiveValue::Set(plan_id.to_string()),
                key: ActiveValue::Set(key.clone()),
                value: ActiveValue::Set(value.to_string()),
                label: ActiveValue::Set(label.map(ToString::to_string)),
                sort_order: ActiveValue::Set(sort_order),
            };

            // Upsert: insert if missing, otherwise update in place.
            match plan_features::Entity::find_by_id((plan_id.to_string(), key.clone()))
                .one(&db_tx)
                .await?
            {
                Some(_) => {
                    active.update(&db_tx).await?;
                }
                None => {
                    active.insert(&db_tx).await?;
                }
            }
            Ok(())
        })
    }
}

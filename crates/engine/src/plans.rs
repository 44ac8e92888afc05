//! Plans table and the assembled plan snapshot.
//!
//! Plans are keyed by a surrogate id; `name` is unique but mutable display
//! data, so renaming a plan never breaks sticker or subscription joins.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Feature, FeatureKey, FeatureValue, plan_features, util::parse_uuid};

/// Name of the plan every verified user starts on.
pub const DEFAULT_PLAN_NAME: &str = "Basic";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub display_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::plan_features::Entity")]
    PlanFeatures,
}

impl Related<super::plan_features::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlanFeatures.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// A plan with its ordered, typed feature list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub display_order: i32,
    pub features: Vec<Feature>,
}

impl TryFrom<(Model, Vec<plan_features::Model>)> for Plan {
    type Error = EngineError;

    fn try_from(
        (model, feature_models): (Model, Vec<plan_features::Model>),
    ) -> Result<Self, Self::Error> {
        let features = feature_models
            .into_iter()
            .map(|row| {
                let key = FeatureKey::parse(&row.key);
                let value = FeatureValue::for_key(&key, &row.value);
                Feature {
                    key,
                    value,
                    label: row.label,
                }
            })
            .collect();

        Ok(Self {
            id: parse_uuid(&model.id, "plan")?,
            name: model.name,
            price_cents: model.price_cents,
            display_order: model.display_order,
            features,
        })
    }
}

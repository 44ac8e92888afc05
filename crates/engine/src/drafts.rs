//! Drafts: persisted, shareable wall documents.
//!
//! The canvas content is an opaque serialized blob; the engine only cares
//! about ownership, visibility and the revision counter used to reject
//! stale saves.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, draft_editors, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "drafts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Opaque serialized canvas state.
    pub state: String,
    pub public: bool,
    /// Incremented on every save; saves against an older value are rejected.
    pub revision: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::draft_editors::Entity")]
    DraftEditors,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::draft_editors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DraftEditors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// A draft snapshot with its editors list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub state: String,
    pub public: bool,
    pub revision: i64,
    pub editors: Vec<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl TryFrom<(Model, Vec<draft_editors::Model>)> for Draft {
    type Error = EngineError;

    fn try_from(
        (model, editor_models): (Model, Vec<draft_editors::Model>),
    ) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "draft")?,
            owner_id: model.user_id,
            name: model.name,
            state: model.state,
            public: model.public,
            revision: model.revision,
            editors: editor_models.into_iter().map(|row| row.username).collect(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

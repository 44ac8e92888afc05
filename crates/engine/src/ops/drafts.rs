use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{Draft, EngineError, ResultEngine, draft_editors, drafts};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    async fn assemble_draft(
        &self,
        db: &DatabaseTransaction,
        model: drafts::Model,
    ) -> ResultEngine<Draft> {
        let editors = draft_editors::Entity::find()
            .filter(draft_editors::Column::DraftId.eq(model.id.clone()))
            .order_by_asc(draft_editors::Column::Username)
            .all(db)
            .await?;
        Draft::try_from((model, editors))
    }

    /// Creates or updates a draft, returning its id and new revision.
    ///
    /// Save is double-gated: the actor must be owner or editor of the
    /// target, AND the actor's own plan must grant `share`. An editor whose
    /// plan lacks the capability is blocked even though they pass the
    /// membership check; the two layers are never collapsed. On update, a
    /// mismatching `expected_revision` rejects the save instead of silently
    /// overwriting newer content.
    pub async fn save_draft(
        &self,
        draft_id: Option<Uuid>,
        name: &str,
        state: &str,
        public: bool,
        expected_revision: Option<i64>,
        user_id: &str,
    ) -> ResultEngine<(Uuid, i64)> {
        let name = normalize_required_name(name, "draft name")?;

        with_tx!(self, |db_tx| {
            let actor = self.require_user_by_id(&db_tx, user_id).await?;
            self.require_share_capability(&db_tx, &actor).await?;

            match draft_id {
                None => {
                    if let Some(limit) = self.drafts_limit_for(&db_tx, &actor).await? {
                        let owned = drafts::Entity::find()
                            .filter(drafts::Column::UserId.eq(actor.id.clone()))
                            .count(&db_tx)
                            .await?;
                        if owned >= limit.max(0) as u64 {
                            return Err(EngineError::Forbidden(
                                "draft limit reached for this plan".to_string(),
                            ));
                        }
                    }

                    let id = Uuid::new_v4();
                    let now = Utc::now();
                    let draft = drafts::ActiveModel {
                        id: ActiveValue::Set(id.to_string()),
                        user_id: ActiveValue::Set(actor.id.clone()),
                        name: ActiveValue::Set(name.clone()),
                        state: ActiveValue::Set(state.to_string()),
                        public: ActiveValue::Set(public),
                        revision: ActiveValue::Set(1),
                        created_at: ActiveValue::Set(now),
                        updated_at: ActiveValue::Set(now),
                    };
                    draft.insert(&db_tx).await?;
                    Ok((id, 1))
                }
                Some(existing_id) => {
                    let model = self
                        .require_draft_write(&db_tx, existing_id, &actor)
                        .await?;
                    if let Some(expected) = expected_revision
                        && expected != model.revision
                    {
                        return Err(EngineError::RevisionMismatch(format!(
                            "draft is at revision {}, save was against {expected}",
                            model.revision
                        )));
                    }

                    let next_revision = model.revision + 1;
                    let update = drafts::ActiveModel {
                        id: ActiveValue::Set(model.id.clone()),
                        name: ActiveValue::Set(name.clone()),
                        state: ActiveValue::Set(state.to_string()),
                        public: ActiveValue::Set(public),
                        revision: ActiveValue::Set(next_revision),
                        updated_at: ActiveValue::Set(Utc::now()),
                        ..Default::default()
                    };
                    update.update(&db_tx).await?;
                    Ok((existing_id, next_revision))
                }
            }
        })
    }

    /// Returns a draft if the actor may view it. `actor_user_id` is `None`
    /// for anonymous callers, who only pass on public drafts.
    pub async fn draft(
        &self,
        draft_id: Uuid,
        actor_user_id: Option<&str>,
    ) -> ResultEngine<Draft> {
        with_tx!(self, |db_tx| {
            let actor = match actor_user_id {
                Some(id) => Some(self.require_user_by_id(&db_tx, id).await?),
                None => None,
            };
            let model = self
                .require_draft_view(&db_tx, draft_id, actor.as_ref())
                .await?;
            self.assemble_draft(&db_tx, model).await
        })
    }

    /// Lists drafts owned by the user and drafts shared with them.
    ///
    /// "Shared with me" goes through the editors index, never a scan of the
    /// full drafts table.
    pub async fn list_drafts(&self, user_id: &str) -> ResultEngine<(Vec<Draft>, Vec<Draft>)> {
        with_tx!(self, |db_tx| {
            let user = self.require_user_by_id(&db_tx, user_id).await?;

            let own_models = drafts::Entity::find()
                .filter(drafts::Column::UserId.eq(user.id.clone()))
                .order_by_desc(drafts::Column::UpdatedAt)
                .all(&db_tx)
                .await?;
            let mut mine = Vec::with_capacity(own_models.len());
            for model in own_models {
                mine.push(self.assemble_draft(&db_tx, model).await?);
            }

            let editor_rows = draft_editors::Entity::find()
                .filter(draft_editors::Column::Username.eq(user.username.clone()))
                .all(&db_tx)
                .await?;
            let shared_ids: Vec<String> =
                editor_rows.into_iter().map(|row| row.draft_id).collect();
            let mut shared = Vec::with_capacity(shared_ids.len());
            if !shared_ids.is_empty() {
                let models = drafts::Entity::find()
                    .filter(drafts::Column::Id.is_in(shared_ids))
                    .order_by_desc(drafts::Column::UpdatedAt)
                    .all(&db_tx)
                    .await?;
                for model in models {
                    shared.push(self.assemble_draft(&db_tx, model).await?);
                }
            }

            Ok((mine, shared))
        })
    }

    /// Deletes a draft and its editor rows (owner-only).
    pub async fn delete_draft(&self, draft_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let draft = self.require_draft_owner(&db_tx, draft_id, user_id).await?;
            draft_editors::Entity::delete_many()
                .filter(draft_editors::Column::DraftId.eq(draft.id.clone()))
                .exec(&db_tx)
                .await?;
            drafts::Entity::delete_by_id(draft.id).exec(&db_tx).await?;
            Ok(())
        })
    }

    /// Adds an editor (owner-only). The target must resolve to an existing
    /// user and may not be the owner; re-adding is a no-op.
    pub async fn add_draft_editor(
        &self,
        draft_id: Uuid,
        editor_username: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let editor_username = normalize_required_name(editor_username, "username")?;

        with_tx!(self, |db_tx| {
            let draft = self.require_draft_owner(&db_tx, draft_id, user_id).await?;
            let editor = self
                .require_user_by_username(&db_tx, &editor_username)
                .await?;
            if editor.id == draft.user_id {
                return Err(EngineError::InvalidValue(
                    "the owner cannot be added as editor".to_string(),
                ));
            }

            if !self
                .is_draft_editor(&db_tx, &draft.id, &editor.username)
                .await?
            {
                let row = draft_editors::ActiveModel {
                    draft_id: ActiveValue::Set(draft.id.clone()),
                    username: ActiveValue::Set(editor.username.clone()),
                };
                row.insert(&db_tx).await?;
            }
            Ok(())
        })
    }

    /// Removes an editor (owner-only). Removing a non-member is a no-op.
    pub async fn remove_draft_editor(
        &self,
        draft_id: Uuid,
        editor_username: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let draft = self.require_draft_owner(&db_tx, draft_id, user_id).await?;
            draft_editors::Entity::delete_by_id((draft.id, editor_username.to_string()))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Lists editors (owner-only).
    pub async fn list_draft_editors(
        &self,
        draft_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<String>> {
        with_tx!(self, |db_tx| {
            let draft = self.require_draft_owner(&db_tx, draft_id, user_id).await?;
            let rows = draft_editors::Entity::find()
                .filter(draft_editors::Column::DraftId.eq(draft.id))
                .order_by_asc(draft_editors::Column::Username)
                .all(&db_tx)
                .await?;
            Ok(rows.into_iter().map(|row| row.username).collect())
        })
    }
}

use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Role, draft_editors, drafts, users};

use super::Engine;

impl Engine {
    pub(super) async fn find_user_by_id(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<Option<users::Model>> {
        users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_user_by_id(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<users::Model> {
        self.find_user_by_id(db, user_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    pub(super) async fn find_user_by_username(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username.to_string()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_user_by_username(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<users::Model> {
        self.find_user_by_username(db, username)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    pub(super) async fn find_user_by_email(
        &self,
        db: &DatabaseTransaction,
        email: &str,
    ) -> ResultEngine<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email.to_string()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Resolves the acting user and rejects anyone who is not an admin.
    pub(super) async fn require_admin(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<users::Model> {
        let user = self.require_user_by_id(db, user_id).await?;
        let role = Role::try_from(user.role.as_str())?;
        if !role.is_admin() {
            return Err(EngineError::Forbidden("admin only".to_string()));
        }
        Ok(user)
    }

    pub(super) async fn require_draft(
        &self,
        db: &DatabaseTransaction,
        draft_id: Uuid,
    ) -> ResultEngine<drafts::Model> {
        drafts::Entity::find_by_id(draft_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("draft not exists".to_string()))
    }

    pub(super) async fn is_draft_editor(
        &self,
        db: &DatabaseTransaction,
        draft_id: &str,
        username: &str,
    ) -> ResultEngine<bool> {
        draft_editors::Entity::find_by_id((draft_id.to_string(), username.to_string()))
            .one(db)
            .await
            .map(|row| row.is_some())
            .map_err(Into::into)
    }

    /// View rule: public, owner, or listed editor. Anonymous actors only
    /// pass on public drafts.
    pub(super) async fn require_draft_view(
        &self,
        db: &DatabaseTransaction,
        draft_id: Uuid,
        actor: Option<&users::Model>,
    ) -> ResultEngine<drafts::Model> {
        let draft = self.require_draft(db, draft_id).await?;
        if draft.public {
            return Ok(draft);
        }
        let Some(actor) = actor else {
            return Err(EngineError::Forbidden("draft is private".to_string()));
        };
        if draft.user_id == actor.id
            || self.is_draft_editor(db, &draft.id, &actor.username).await?
        {
            return Ok(draft);
        }
        Err(EngineError::Forbidden("draft is private".to_string()))
    }

    /// Content-mutation rule: owner or listed editor. The feature gate on
    /// the actor's own plan is checked separately; both must pass.
    pub(super) async fn require_draft_write(
        &self,
        db: &DatabaseTransaction,
        draft_id: Uuid,
        actor: &users::Model,
    ) -> ResultEngine<drafts::Model> {
        let draft = self.require_draft(db, draft_id).await?;
        if draft.user_id == actor.id
            || self.is_draft_editor(db, &draft.id, &actor.username).await?
        {
            return Ok(draft);
        }
        Err(EngineError::Forbidden(
            "only the owner or an editor can modify a draft".to_string(),
        ))
    }

    pub(super) async fn require_draft_owner(
        &self,
        db: &DatabaseTransaction,
        draft_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<drafts::Model> {
        let draft = self.require_draft(db, draft_id).await?;
        if draft.user_id != user_id {
            return Err(EngineError::Forbidden("draft owner only".to_string()));
        }
        Ok(draft)
    }
}

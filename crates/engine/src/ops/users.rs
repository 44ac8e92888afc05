use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Role, draft_editors, drafts, pending_registrations, sessions,
    subscriptions, user_stickers, users,
    util::{hash_password, verify_password},
};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Bootstrap helper (admin CLI): creates a verified user directly,
    /// bypassing the code-verified registration flow.
    pub async fn create_verified_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> ResultEngine<users::Model> {
        let username = normalize_required_name(username, "username")?;
        let email = normalize_required_name(email, "email")?;
        let password_hash = hash_password(password)?;

        with_tx!(self, |db_tx| {
            if self
                .find_user_by_username(&db_tx, &username)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(username.clone()));
            }
            if self.find_user_by_email(&db_tx, &email).await?.is_some() {
                return Err(EngineError::ExistingKey(email.clone()));
            }

            let user = users::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4().to_string()),
                username: ActiveValue::Set(username.clone()),
                email: ActiveValue::Set(email.clone()),
                password_hash: ActiveValue::Set(password_hash.clone()),
                display_name: ActiveValue::Set(None),
                role: ActiveValue::Set(role.as_str().to_string()),
                email_verified: ActiveValue::Set(true),
                created_at: ActiveValue::Set(Utc::now()),
            };
            let user = user.insert(&db_tx).await?;
            Ok(user)
        })
    }

    /// Checks a username/password pair and returns the user on success.
    ///
    /// Unknown users and wrong passwords get the same error so the endpoint
    /// cannot be used to probe for accounts.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> ResultEngine<users::Model> {
        let username = normalize_required_name(username, "username")?;
        let user = with_tx!(self, |db_tx| {
            self.find_user_by_username(&db_tx, &username).await
        })?;
        let user =
            user.ok_or_else(|| EngineError::Forbidden("invalid credentials".to_string()))?;
        if !verify_password(password, &user.password_hash) {
            return Err(EngineError::Forbidden("invalid credentials".to_string()));
        }
        Ok(user)
    }

    /// Password login: verify credentials and issue a session token.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> ResultEngine<(users::Model, String)> {
        let user = self.verify_credentials(username, password).await?;
        let token = self.issue_session(&user.id).await?;
        Ok((user, token))
    }

    pub async fn user(&self, user_id: &str) -> ResultEngine<users::Model> {
        with_tx!(self, |db_tx| self.require_user_by_id(&db_tx, user_id).await)
    }

    /// Profile edit. An empty display name clears the field.
    pub async fn update_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> ResultEngine<users::Model> {
        with_tx!(self, |db_tx| {
            let user = self.require_user_by_id(&db_tx, user_id).await?;
            let mut active: users::ActiveModel = user.into();
            active.display_name = ActiveValue::Set(
                display_name
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string),
            );
            let updated = active.update(&db_tx).await?;
            Ok(updated)
        })
    }

    /// Changes a user's role (admin-only).
    pub async fn set_role(
        &self,
        target_user_id: &str,
        role: Role,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, user_id).await?;
            let target = self.require_user_by_id(&db_tx, target_user_id).await?;
            let mut active: users::ActiveModel = target.into();
            active.role = ActiveValue::Set(role.as_str().to_string());
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Deletes a user (admin or the user themselves) and everything hanging
    /// off them: editorships, owned drafts, sticker grants, sessions,
    /// subscription and pending rows.
    pub async fn delete_user(&self, target_user_id: &str, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            if target_user_id != user_id {
                self.require_admin(&db_tx, user_id).await?;
            }
            let target = self.require_user_by_id(&db_tx, target_user_id).await?;

            draft_editors::Entity::delete_many()
                .filter(draft_editors::Column::Username.eq(target.username.clone()))
                .exec(&db_tx)
                .await?;

            let owned: Vec<String> = drafts::Entity::find()
                .filter(drafts::Column::UserId.eq(target.id.clone()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|model| model.id)
                .collect();
            if !owned.is_empty() {
                draft_editors::Entity::delete_many()
                    .filter(draft_editors::Column::DraftId.is_in(owned.clone()))
                    .exec(&db_tx)
                    .await?;
                drafts::Entity::delete_many()
                    .filter(drafts::Column::Id.is_in(owned))
                    .exec(&db_tx)
                    .await?;
            }

            user_stickers::Entity::delete_many()
                .filter(user_stickers::Column::UserId.eq(target.id.clone()))
                .exec(&db_tx)
                .await?;
            sessions::Entity::delete_many()
                .filter(sessions::Column::UserId.eq(target.id.clone()))
                .exec(&db_tx)
                .await?;
            subscriptions::Entity::delete_by_id(target.id.clone())
                .exec(&db_tx)
                .await?;
            pending_registrations::Entity::delete_many()
                .filter(pending_registrations::Column::Email.eq(target.email.clone()))
                .exec(&db_tx)
                .await?;
            users::Entity::delete_by_id(target.id).exec(&db_tx).await?;
            Ok(())
        })
    }
}

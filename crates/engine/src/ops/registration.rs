use chrono::Utc;
use sea_orm::{ActiveValue, Condition, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Role, mail::generate_verification_code, pending_registrations,
    users, util::hash_password,
};

use super::{Engine, normalize_required_name, with_tx};

enum VerifyOutcome {
    Promoted(users::Model),
    DuplicateUser,
}

impl Engine {
    /// Mail send with the configured timeout. `Ok` means the collaborator
    /// accepted the message.
    async fn send_code_mail(&self, to: &str, code: &str) -> ResultEngine<()> {
        match tokio::time::timeout(
            self.mail_timeout,
            self.mailer.send_verification_code(to, code),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(EngineError::Mail(err.to_string())),
            Err(_) => Err(EngineError::Mail("verification mail timed out".to_string())),
        }
    }

    /// Starts a registration: persists a pending row and mails the code.
    ///
    /// The insert and the mail send share one transaction that commits only
    /// after the mailer accepted the message, so "sent" in the response is
    /// never a lie and a mail failure leaves no half-registered identity.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> ResultEngine<()> {
        let username = normalize_required_name(username, "username")?;
        let email = normalize_required_name(email, "email")?;
        if !email.contains('@') {
            return Err(EngineError::InvalidValue(
                "invalid email address".to_string(),
            ));
        }
        if password.len() < 8 {
            return Err(EngineError::InvalidValue(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let password_hash = hash_password(password)?;
        let code = generate_verification_code();

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

            // A second attempt while a pending row exists must resend or
            // verify instead. Unique indexes backstop the race.
            let pending_exists = pending_registrations::Entity::find()
                .filter(
                    Condition::any()
                        .add(pending_registrations::Column::Email.eq(email.clone()))
                        .add(pending_registrations::Column::Username.eq(username.clone())),
                )
                .one(&db_tx)
                .await?
                .is_some();
            if pending_exists {
                return Err(EngineError::ExistingKey(
                    "a registration is already pending for this identity".to_string(),
                ));
            }

            let pending = pending_registrations::ActiveModel {
                email: ActiveValue::Set(email.clone()),
                username: ActiveValue::Set(username.clone()),
                password_hash: ActiveValue::Set(password_hash.clone()),
                display_name: ActiveValue::Set(
                    display_name
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(ToString::to_string),
                ),
                code: ActiveValue::Set(code.clone()),
                created_at: ActiveValue::Set(Utc::now()),
            };
            pending.insert(&db_tx).await?;

            self.send_code_mail(&email, &code).await?;
            Ok(())
        })
    }

    /// Regenerates the code for an existing pending registration and
    /// re-sends the mail. The old code stops matching immediately.
    pub async fn resend_code(&self, email: &str) -> ResultEngine<()> {
        let email = normalize_required_name(email, "email")?;
        let code = generate_verification_code();

        with_tx!(self, |db_tx| {
            let pending = pending_registrations::Entity::find_by_id(email.clone())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("registration not exists".to_string()))?;

            let mut active: pending_registrations::ActiveModel = pending.into();
            active.code = ActiveValue::Set(code.clone());
            active.created_at = ActiveValue::Set(Utc::now());
            active.update(&db_tx).await?;

            self.send_code_mail(&email, &code).await?;
            Ok(())
        })
    }

    /// Promotes a pending registration whose code matches exactly.
    ///
    /// Returns the new user and a session token. The default plan's sticker
    /// grant is best-effort: a failure is logged and never blocks
    /// verification.
    pub async fn verify(&self, email: &str, code: &str) -> ResultEngine<(users::Model, String)> {
        let email = normalize_required_name(email, "email")?;

        let outcome = with_tx!(self, |db_tx| {
            let pending = pending_registrations::Entity::find()
                .filter(pending_registrations::Column::Email.eq(email.clone()))
                .filter(pending_registrations::Column::Code.eq(code.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::InvalidCode("code does not match".to_string()))?;

            if let Some(ttl) = self.code_ttl {
                let age = Utc::now().signed_duration_since(pending.created_at);
                if age.to_std().map(|age| age > ttl).unwrap_or(false) {
                    return Err(EngineError::InvalidCode("code expired".to_string()));
                }
            }

            // A verified user may have appeared for this identity since the
            // pending row was written (double submit).
            let duplicate = self
                .find_user_by_username(&db_tx, &pending.username)
                .await?
                .is_some()
                || self.find_user_by_email(&db_tx, &pending.email).await?.is_some();
            if duplicate {
                pending_registrations::Entity::delete_by_id(pending.email.clone())
                    .exec(&db_tx)
                    .await?;
                Ok(VerifyOutcome::DuplicateUser)
            } else {
                let user = users::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4().to_string()),
                    username: ActiveValue::Set(pending.username.clone()),
                    email: ActiveValue::Set(pending.email.clone()),
                    password_hash: ActiveValue::Set(pending.password_hash.clone()),
                    display_name: ActiveValue::Set(pending.display_name.clone()),
                    role: ActiveValue::Set(Role::Free.as_str().to_string()),
                    email_verified: ActiveValue::Set(true),
                    created_at: ActiveValue::Set(Utc::now()),
                };
                let user = user.insert(&db_tx).await?;
                pending_registrations::Entity::delete_by_id(pending.email.clone())
                    .exec(&db_tx)
                    .await?;
                Ok(VerifyOutcome::Promoted(user))
            }
        })?;

        let user = match outcome {
            VerifyOutcome::DuplicateUser => {
                return Err(EngineError::ExistingKey(
                    "a verified user already exists for this identity".to_string(),
                ));
            }
            VerifyOutcome::Promoted(user) => user,
        };

        if let Err(err) = self.grant_default_plan_stickers(&user.id).await {
            tracing::warn!(
                user_id = %user.id,
                error = %err,
                "failed to grant default plan stickers after verification"
            );
        }

        let token = self.issue_session(&user.id).await?;
        Ok((user, token))
    }
}

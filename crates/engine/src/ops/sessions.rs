use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::RngCore;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};

use crate::{ResultEngine, sessions, users};

use super::{Engine, with_tx};

/// Opaque URL-safe token over 32 random bytes.
fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl Engine {
    /// Issues a session token for an existing user.
    pub async fn issue_session(&self, user_id: &str) -> ResultEngine<String> {
        let token = new_session_token();
        with_tx!(self, |db_tx| {
            self.require_user_by_id(&db_tx, user_id).await?;
            let session = sessions::ActiveModel {
                token: ActiveValue::Set(token.clone()),
                user_id: ActiveValue::Set(user_id.to_string()),
                created_at: ActiveValue::Set(Utc::now()),
            };
            session.insert(&db_tx).await?;
            Ok(token)
        })
    }

    /// Resolves a session token to its user.
    pub async fn session_user(&self, token: &str) -> ResultEngine<Option<users::Model>> {
        with_tx!(self, |db_tx| {
            let Some(session) = sessions::Entity::find_by_id(token.to_string())
                .one(&db_tx)
                .await?
            else {
                return Ok(None);
            };
            self.find_user_by_id(&db_tx, &session.user_id).await
        })
    }

    /// Deletes a session token. Unknown tokens are a no-op.
    pub async fn revoke_session(&self, token: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            sessions::Entity::delete_by_id(token.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}

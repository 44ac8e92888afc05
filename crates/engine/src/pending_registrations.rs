//! Pending (unverified) registrations.
//!
//! At most one row per email; a resend overwrites `code` in place. The row
//! is deleted when the registration is promoted to a user.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "pending_registrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    /// 4-digit numeric verification code, matched exactly.
    pub code: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Core engine for the murale content wall.
//!
//! Owns the pieces with real invariants: the code-verified registration
//! state machine, entitlement resolution (role + plan + stickers), draft
//! visibility and mutation rules, and the plan↔sticker reconciliation that
//! keeps per-user grants in line with plan definitions.

pub use drafts::Draft;
pub use error::EngineError;
pub use features::{Feature, FeatureKey, FeatureValue};
pub use mail::{LogMailer, MailConfig, MailError, Mailer, MemoryMailer, SmtpMailer};
pub use ops::{Engine, EngineBuilder, Entitlements, ReconciliationReport};
pub use plans::{DEFAULT_PLAN_NAME, Plan};
pub use roles::Role;

pub mod draft_editors;
pub mod drafts;
mod error;
mod features;
mod mail;
mod ops;
pub mod pending_registrations;
pub mod plan_features;
pub mod plan_stickers;
pub mod plans;
mod roles;
pub mod sessions;
pub mod subscriptions;
pub mod user_stickers;
pub mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;

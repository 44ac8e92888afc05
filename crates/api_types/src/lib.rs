use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a user as exposed by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Free,
    Advanced,
    Premium,
    Admin,
}

impl Role {
    /// Returns the canonical role string used by the engine/database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Advanced => "advanced",
            Self::Premium => "premium",
            Self::Admin => "admin",
        }
    }
}

pub mod registration {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RegisterRequest {
        pub username: String,
        pub email: String,
        pub password: String,
        pub display_name: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ResendRequest {
        pub email: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct VerifyRequest {
        pub email: String,
        /// The 4-digit code from the verification mail, matched exactly.
        pub code: String,
    }
}

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginRequest {
        pub username: String,
        pub password: String,
    }

    /// Returned by verify and login: the user plus a session credential.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SessionResponse {
        pub user: UserView,
        pub token: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: String,
        pub username: String,
        pub email: String,
        pub display_name: Option<String>,
        pub role: Role,
        pub email_verified: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProfileUpdate {
        pub display_name: Option<String>,
    }
}

pub mod entitlements {
    use super::*;

    /// Typed feature value; plans store strings, the engine types them.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "value", rename_all = "snake_case")]
    pub enum FeatureValue {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct FeatureView {
        pub key: String,
        pub value: FeatureValue,
        pub label: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntitlementsResponse {
        pub role: Role,
        pub plan_id: Uuid,
        pub plan: String,
        pub features: Vec<FeatureView>,
        pub stickers: Vec<String>,
    }
}

pub mod plan {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PlanView {
        pub id: Uuid,
        pub name: String,
        pub price_cents: i64,
        pub display_order: i32,
        pub features: Vec<super::entitlements::FeatureView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PlansResponse {
        pub plans: Vec<PlanView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UpgradeRequest {
        pub plan_id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PlanNew {
        pub name: String,
        pub price_cents: i64,
        pub display_order: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PlanCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FeatureUpsert {
        pub key: String,
        pub value: String,
        pub label: Option<String>,
        pub sort_order: i32,
    }

    /// Request body for redefining a plan's sticker set wholesale.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PlanStickersUpdate {
        pub sticker_ids: Vec<String>,
    }

    /// Response for a redefinition: propagation counts for subscribers.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PlanStickersUpdated {
        pub affected_user_count: u64,
        pub failed_user_count: u64,
    }
}

pub mod draft {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DraftSave {
        /// Absent to create a new draft.
        pub id: Option<Uuid>,
        pub name: String,
        /// Opaque serialized canvas state.
        pub state: String,
        pub public: bool,
        /// Revision the client last saw; a stale value rejects the save.
        pub expected_revision: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DraftSaved {
        pub id: Uuid,
        pub revision: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DraftView {
        pub id: Uuid,
        pub owner_id: String,
        pub name: String,
        pub state: String,
        pub public: bool,
        pub revision: i64,
        pub editors: Vec<String>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DraftListResponse {
        pub mine: Vec<DraftView>,
        pub shared_with_me: Vec<DraftView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EditorAdd {
        pub username: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EditorsResponse {
        pub editors: Vec<String>,
    }
}

pub mod admin {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RoleUpdate {
        pub role: Role,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StickerGrant {
        pub sticker_id: String,
    }
}

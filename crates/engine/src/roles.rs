//! User roles and their mapping to plans.
//!
//! A role is derived from the subscription plan; users without a subscription
//! fall back to the plan named after their role.

use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Free,
    Advanced,
    Premium,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Advanced => "advanced",
            Self::Premium => "premium",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Name of the plan a user of this role falls back to when they have no
    /// subscription row.
    pub fn default_plan_name(self) -> &'static str {
        match self {
            Self::Free => "Basic",
            Self::Advanced => "Advanced",
            Self::Premium | Self::Admin => "Premium",
        }
    }

    /// Role granted by subscribing to the named plan.
    ///
    /// Unknown plan names grant no privileges.
    pub fn from_plan_name(plan_name: &str) -> Self {
        if plan_name.eq_ignore_ascii_case("premium") {
            Self::Premium
        } else if plan_name.eq_ignore_ascii_case("advanced") {
            Self::Advanced
        } else {
            Self::Free
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "free" => Ok(Self::Free),
            "advanced" => Ok(Self::Advanced),
            "premium" => Ok(Self::Premium),
            "admin" => Ok(Self::Admin),
            other => Err(EngineError::InvalidValue(format!("invalid role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [Role::Free, Role::Advanced, Role::Premium, Role::Admin] {
            assert_eq!(Role::try_from(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Role::try_from("root").is_err());
    }

    #[test]
    fn plan_name_mapping() {
        assert_eq!(Role::from_plan_name("Basic"), Role::Free);
        assert_eq!(Role::from_plan_name("advanced"), Role::Advanced);
        assert_eq!(Role::from_plan_name("Premium"), Role::Premium);
        assert_eq!(Role::from_plan_name("Unknown"), Role::Free);
    }
}

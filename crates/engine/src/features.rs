//! Typed plan features.
//!
//! Feature rows are stored as strings; the engine surfaces them as a tagged
//! value so call sites don't re-parse `"true"`/`"42"` ad hoc. The set of
//! known keys is closed; anything else is carried through as
//! [`FeatureKey::Custom`] with a text value.

use serde::{Deserialize, Serialize};

/// Feature keys the engine gates behavior on, plus a fallback for
/// display-only keys defined by admins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    /// Maximum number of drafts a user may own. Absent means unlimited.
    DraftsLimit,
    /// Whether the user's plan allows saving (and thereby sharing) drafts.
    /// Absent means `false`.
    Share,
    /// Any other key; value stays textual.
    Custom(String),
}

impl FeatureKey {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "drafts_limit" => Self::DraftsLimit,
            "share" => Self::Share,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DraftsLimit => "drafts_limit",
            Self::Share => "share",
            Self::Custom(key) => key,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FeatureValue {
    /// Interpret a stored string for the given key.
    ///
    /// Unparseable values for typed keys degrade to text instead of failing,
    /// so a bad admin edit never breaks entitlement resolution.
    pub fn for_key(key: &FeatureKey, raw: &str) -> Self {
        match key {
            FeatureKey::Share => Self::Bool(raw == "true"),
            FeatureKey::DraftsLimit => raw
                .parse::<i64>()
                .map(Self::Int)
                .unwrap_or_else(|_| Self::Text(raw.to_string())),
            FeatureKey::Custom(_) => Self::Text(raw.to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

/// A resolved plan feature, in plan-defined order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub key: FeatureKey,
    pub value: FeatureValue,
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_get_typed_values() {
        let share = FeatureKey::parse("share");
        assert_eq!(FeatureValue::for_key(&share, "true"), FeatureValue::Bool(true));
        assert_eq!(FeatureValue::for_key(&share, "false"), FeatureValue::Bool(false));
        assert_eq!(FeatureValue::for_key(&share, "yes"), FeatureValue::Bool(false));

        let limit = FeatureKey::parse("drafts_limit");
        assert_eq!(FeatureValue::for_key(&limit, "3"), FeatureValue::Int(3));
    }

    #[test]
    fn unparseable_limit_degrades_to_text() {
        let limit = FeatureKey::parse("drafts_limit");
        assert_eq!(
            FeatureValue::for_key(&limit, "lots"),
            FeatureValue::Text("lots".to_string())
        );
    }

    #[test]
    fn unknown_keys_stay_textual() {
        let key = FeatureKey::parse("support_tier");
        assert_eq!(key.as_str(), "support_tier");
        assert_eq!(
            FeatureValue::for_key(&key, "gold"),
            FeatureValue::Text("gold".to_string())
        );
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::config::defaults::DEFAULT_MAX_TOKENS;

/// Account role. Roles this build does not know are kept verbatim in
/// `Other`, so one hand-edited record cannot make the whole table unreadable
/// and the value survives the next table rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Admin,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Other(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Role::User,
            "admin" => Role::Admin,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

/// One entry of `users.json`, keyed by identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub token: String,
    pub role: Role,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub used_tokens: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(
        rename = "createdDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_date: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_tokens() -> u64 {
    DEFAULT_MAX_TOKENS
}

impl UserRecord {
    pub fn new(token: String, role: Role, max_tokens: u64) -> Self {
        Self {
            token,
            role,
            active: true,
            used_tokens: 0,
            max_tokens,
            created_date: None,
        }
    }
}

pub type UserTable = BTreeMap<String, UserRecord>;

/// Row of the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    pub user_id: String,
    pub role: Role,
    pub active: bool,
    pub used_tokens: u64,
    pub max_tokens: u64,
}

impl UserRow {
    pub fn from_record(user_id: &str, record: &UserRecord) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: record.role.clone(),
            active: record.active,
            used_tokens: record.used_tokens,
            max_tokens: record.max_tokens,
        }
    }
}

/// Edited dashboard row. Table editors send cells back as text, so both
/// fields accept either their native JSON type or a string.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRowUpdate {
    pub user_id: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub active: bool,
    #[serde(deserialize_with = "deserialize_count")]
    pub max_tokens: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagCell {
    Bool(bool),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountCell {
    Number(u64),
    Float(f64),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match FlagCell::deserialize(deserializer)? {
        FlagCell::Bool(value) => value,
        FlagCell::Text(text) => text.trim().eq_ignore_ascii_case("true"),
    })
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match CountCell::deserialize(deserializer)? {
        CountCell::Number(value) => Ok(value),
        CountCell::Float(value) if value >= 0.0 && value.is_finite() => Ok(value.trunc() as u64),
        CountCell::Float(value) => Err(serde::de::Error::custom(format!(
            "max_tokens must be a non-negative integer, got {}",
            value
        ))),
        CountCell::Text(text) => text.trim().parse::<u64>().map_err(|_| {
            serde::de::Error::custom(format!(
                "max_tokens must be a non-negative integer, got {:?}",
                text
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_reads_provisioned_shape() {
        let record: UserRecord = serde_json::from_value(json!({
            "token": "abc",
            "role": "user",
            "active": false,
            "used_tokens": 42,
            "max_tokens": 50,
            "createdDate": "2025-05-01 10:00:00"
        }))
        .unwrap();

        assert_eq!(record.role, Role::User);
        assert!(!record.active);
        assert_eq!(record.used_tokens, 42);
        assert_eq!(record.max_tokens, 50);
        assert_eq!(record.created_date.as_deref(), Some("2025-05-01 10:00:00"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["createdDate"], "2025-05-01 10:00:00");
    }

    #[test]
    fn record_fills_missing_fields_with_defaults() {
        let record: UserRecord =
            serde_json::from_value(json!({ "token": "abc", "role": "admin" })).unwrap();

        assert!(record.active);
        assert_eq!(record.used_tokens, 0);
        assert_eq!(record.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(record.created_date.is_none());
    }

    #[test]
    fn unrecognized_role_does_not_break_the_table() {
        let table: UserTable = serde_json::from_value(json!({
            "happy-otter-204": { "token": "a", "role": "user" },
            "proud-hawk-300": { "token": "b", "role": "moderator" }
        }))
        .unwrap();

        assert_eq!(table["happy-otter-204"].role, Role::User);
        assert_eq!(
            table["proud-hawk-300"].role,
            Role::Other("moderator".to_string())
        );

        let back = serde_json::to_value(&table).unwrap();
        assert_eq!(back["proud-hawk-300"]["role"], "moderator");
        assert_eq!(back["happy-otter-204"]["role"], "user");
    }

    #[test]
    fn row_update_normalizes_text_cells() {
        let rows: Vec<UserRowUpdate> = serde_json::from_value(json!([
            { "user_id": "a", "active": "True ", "max_tokens": "50" },
            { "user_id": "b", "active": "no", "max_tokens": 70.0 },
            { "user_id": "c", "active": false, "max_tokens": 128000 }
        ]))
        .unwrap();

        assert!(rows[0].active);
        assert_eq!(rows[0].max_tokens, 50);
        assert!(!rows[1].active);
        assert_eq!(rows[1].max_tokens, 70);
        assert!(!rows[2].active);
        assert_eq!(rows[2].max_tokens, 128_000);
    }

    #[test]
    fn row_update_rejects_garbage_budget() {
        let result: Result<UserRowUpdate, _> = serde_json::from_value(json!({
            "user_id": "a", "active": true, "max_tokens": "lots"
        }));
        assert!(result.is_err());
    }
}

//! Session-related common types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Claims carried in the payload segment of a session token.
///
/// Only `exp` matters to the client. Named claims of an unexpected JSON type
/// read as `None` instead of failing the whole payload. Everything the server
/// adds beyond the named claims is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID). Numeric subjects are read as their decimal string.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub: Option<String>,
    /// Expiration time (Unix timestamp, seconds; fractions are floored)
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,
    /// Issued at time (Unix timestamp, seconds; fractions are floored)
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,
    /// Role claim, e.g. "admin" or "club"
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Strings as-is, numbers as their decimal text, anything else `None`
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// RFC 7519 NumericDate: integer or fractional seconds, floored
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64)),
        _ => None,
    })
}

/// Display data for the logged-in user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionUser {
    pub fn new(name: impl Into<String>, role: Option<String>) -> Self {
        Self {
            name: Some(name.into()),
            role,
            extra: Map::new(),
        }
    }
}

/// The persisted session bundle: `{ token, user, ... }`.
///
/// Fields written by other client versions survive a rewrite through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    pub fn new(token: impl Into<String>, user: Option<SessionUser>) -> Self {
        Self {
            token: Some(token.into()),
            user,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_record_keeps_unknown_fields() {
        let raw = json!({
            "token": "abc.def.ghi",
            "user": { "name": "Kim", "role": "admin", "clubId": 7 },
            "lastVisited": "/brackets"
        });

        let record: SessionRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.token.as_deref(), Some("abc.def.ghi"));
        let user = record.user.as_ref().unwrap();
        assert_eq!(user.name.as_deref(), Some("Kim"));
        assert_eq!(user.extra.get("clubId"), Some(&json!(7)));

        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn test_claims_without_exp() {
        let claims: Claims = serde_json::from_value(json!({ "sub": "42" })).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert!(claims.exp.is_none());
    }

    #[test]
    fn test_claims_tolerate_unexpected_types() {
        let claims: Claims = serde_json::from_value(json!({
            "exp": 1_700_000_060,
            "role": ["admin", "club"],
            "sub": { "id": 3 }
        }))
        .unwrap();
        assert_eq!(claims.exp, Some(1_700_000_060));
        assert!(claims.role.is_none());
        assert!(claims.sub.is_none());

        let claims: Claims =
            serde_json::from_value(json!({ "exp": 1_700_000_060, "role": 2 })).unwrap();
        assert_eq!(claims.role.as_deref(), Some("2"));

        let claims: Claims =
            serde_json::from_value(json!({ "exp": "tomorrow", "iat": null })).unwrap();
        assert!(claims.exp.is_none());
        assert!(claims.iat.is_none());
    }

    #[test]
    fn test_claims_fractional_numeric_dates() {
        let claims: Claims = serde_json::from_value(json!({
            "exp": 1_700_000_060.75,
            "iat": 1_699_999_000.5
        }))
        .unwrap();
        assert_eq!(claims.exp, Some(1_700_000_060));
        assert_eq!(claims.iat, Some(1_699_999_000));
    }

    #[test]
    fn test_session_user_numeric_role() {
        let record: SessionRecord = serde_json::from_value(json!({
            "token": "abc.def.ghi",
            "user": { "name": "Kim", "role": 1 }
        }))
        .unwrap();
        assert_eq!(record.user.unwrap().role.as_deref(), Some("1"));
    }

    #[test]
    fn test_claims_numeric_subject() {
        let claims: Claims =
            serde_json::from_value(json!({ "sub": 42, "exp": 1_700_000_000, "scope": ["read"] }))
                .unwrap();
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.extra.get("scope"), Some(&json!(["read"])));
    }
}

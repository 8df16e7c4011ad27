//! Response envelope used by most Turnier endpoints

use serde::{Deserialize, Serialize};

/// `{ success, data?, error?, message? }`
///
/// Not every endpoint wraps its payload; callers decide whether to decode into
/// this shape or into the bare value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Server-provided explanation, `error` taking priority over `message`
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }

    /// The payload of a successful envelope, or the server's explanation
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err("Response envelope has no data".to_string()),
            (false, _) => Err(self
                .error
                .or(self.message)
                .unwrap_or_else(|| "Request was not successful".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_result() {
        let ok: ApiEnvelope<u32> =
            serde_json::from_value(json!({ "success": true, "data": 7 })).unwrap();
        assert_eq!(ok.into_result(), Ok(7));

        let failed: ApiEnvelope<u32> = serde_json::from_value(
            json!({ "success": false, "message": "Bracket locked", "error": "LOCKED" }),
        )
        .unwrap();
        assert_eq!(failed.error_message(), Some("LOCKED"));
        assert_eq!(failed.into_result(), Err("LOCKED".to_string()));

        let empty: ApiEnvelope<u32> = serde_json::from_value(json!({ "success": true })).unwrap();
        assert!(empty.into_result().is_err());
    }
}

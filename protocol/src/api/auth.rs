//! Authentication API DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::common::{SessionRecord, SessionUser};

// ============================================================================
// Login DTOs
// ============================================================================

/// Credentials for POST /auth/login
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
}

/// Login response: a fresh session token and the user's display data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<SessionUser>,
}

impl From<LoginResponse> for SessionRecord {
    fn from(response: LoginResponse) -> Self {
        SessionRecord::new(response.token, response.user)
    }
}

// ============================================================================
// Token Refresh DTOs
// ============================================================================

/// Response of POST /auth/refresh. The request has no body; the current token
/// travels in the Authorization header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_validation() {
        let ok = LoginRequest {
            username: "trainer".to_string(),
            password: "secret".to_string(),
        };
        assert!(ok.validate().is_ok());

        let empty = LoginRequest {
            username: String::new(),
            password: "secret".to_string(),
        };
        assert!(empty.validate().is_err());
    }
}

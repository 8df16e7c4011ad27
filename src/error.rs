//! Unified error handling for the Turnier client and CLI
//!
//! Every caller-visible failure carries an `ErrorCode` so that log lines and
//! bug reports can be matched to a cause without reading message text.

use std::fmt;
use thiserror::Error;

/// Unified Result type for all Turnier client operations
pub type Result<T> = std::result::Result<T, TurnierError>;

/// Error codes for Turnier client operations
///
/// Each error has a unique code in the format `TXXX` where:
/// - T1XX: Session and authorization errors
/// - T2XX: Network and API errors
/// - T3XX: Storage I/O errors
/// - T4XX: Configuration errors
/// - T5XX: Validation and input errors
/// - T8XX: UI and interaction errors
/// - T9XX: Serialization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Session (T1XX)
    /// T101: Session expired or rejected by the server
    SessionExpired,
    /// T102: Authenticated but not allowed
    Forbidden,
    /// T103: No session present
    NotAuthenticated,
    /// T104: Login rejected
    LoginFailed,

    // Network (T2XX)
    /// T201: HTTP request failed before a response arrived
    HttpError,
    /// T202: Request timed out
    ConnectionTimeout,
    /// T203: Connection refused
    ConnectionRefused,
    /// T204: Server answered with an error status
    RequestFailed,
    /// T205: Response body could not be decoded
    InvalidResponse,

    // Storage (T3XX)
    /// T301: Storage read failed
    StorageReadError,
    /// T302: Storage write failed
    StorageWriteError,
    /// T303: Storage directory could not be created
    DirectoryError,

    // Configuration (T4XX)
    /// T401: Configuration error
    ConfigError,
    /// T402: Invalid endpoint URL
    InvalidEndpoint,

    // Validation (T5XX)
    /// T501: Invalid input
    InvalidInput,
    /// T502: Invalid header name or value
    InvalidHeader,

    // UI (T8XX)
    /// T801: Dialog error
    DialogError,
    /// T802: User cancelled
    UserCancelled,

    // Serialization (T9XX)
    /// T902: Serialization error
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::SessionExpired => 101,
            ErrorCode::Forbidden => 102,
            ErrorCode::NotAuthenticated => 103,
            ErrorCode::LoginFailed => 104,

            ErrorCode::HttpError => 201,
            ErrorCode::ConnectionTimeout => 202,
            ErrorCode::ConnectionRefused => 203,
            ErrorCode::RequestFailed => 204,
            ErrorCode::InvalidResponse => 205,

            ErrorCode::StorageReadError => 301,
            ErrorCode::StorageWriteError => 302,
            ErrorCode::DirectoryError => 303,

            ErrorCode::ConfigError => 401,
            ErrorCode::InvalidEndpoint => 402,

            ErrorCode::InvalidInput => 501,
            ErrorCode::InvalidHeader => 502,

            ErrorCode::DialogError => 801,
            ErrorCode::UserCancelled => 802,

            ErrorCode::SerializationError => 902,
        }
    }

    /// Get the string code (e.g., "T101")
    pub fn as_str(&self) -> String {
        format!("T{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.code())
    }
}

/// Main error type for all Turnier client operations
#[derive(Error, Debug)]
pub enum TurnierError {
    // ==================== Session Errors (T1XX) ====================
    /// The server rejected the session (401). The local session has already
    /// been cleared when this is returned from a dispatched call.
    #[error("[{code}] Session expired: {message}")]
    SessionExpired { code: ErrorCode, message: String },

    /// The server refused the action for this user (403)
    #[error("[{code}] Forbidden: {message}")]
    Forbidden { code: ErrorCode, message: String },

    /// Login rejected or no session available
    #[error("[{code}] Authentication failed: {message}")]
    Authentication { code: ErrorCode, message: String },

    // ==================== Network Errors (T2XX) ====================
    /// No response was obtained (offline, timeout, DNS, TLS)
    #[error("[{code}] Network error: {message}")]
    Network {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Any other non-2xx response
    #[error("[{code}] Request failed ({status}): {message}")]
    RequestFailed {
        code: ErrorCode,
        status: u16,
        message: String,
    },

    // ==================== Storage Errors (T3XX) ====================
    #[error("[{code}] {context}: {message}")]
    Io {
        code: ErrorCode,
        context: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // ==================== Configuration Errors (T4XX) ====================
    #[error("[{code}] Configuration error: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    // ==================== Validation Errors (T5XX) ====================
    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: ErrorCode, message: String },

    // ==================== UI Errors (T8XX) ====================
    #[error("[{code}] UI error: {message}")]
    Ui { code: ErrorCode, message: String },

    // ==================== Serialization Errors (T9XX) ====================

    #[error("[{code}] Serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

// ==================== Constructor Methods ====================

impl TurnierError {
    // --- Session ---

    /// Create session expired error
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::SessionExpired {
            code: ErrorCode::SessionExpired,
            message: message.into(),
        }
    }

    /// Create forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: ErrorCode::Forbidden,
            message: message.into(),
        }
    }

    /// Create "no session" error
    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::NotAuthenticated,
            message: message.into(),
        }
    }

    /// Create login failure error
    pub fn login_failed(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::LoginFailed,
            message: message.into(),
        }
    }

    // --- Network ---

    /// Create network error from message
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::HttpError,
            message: message.into(),
            source: None,
        }
    }

    /// Create network error from reqwest error
    pub fn network_from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::ConnectionTimeout
        } else if err.is_connect() {
            ErrorCode::ConnectionRefused
        } else {
            ErrorCode::HttpError
        };

        Self::Network {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create request failed error
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            code: ErrorCode::RequestFailed,
            status,
            message: message.into(),
        }
    }

    /// Create invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Serialization {
            code: ErrorCode::InvalidResponse,
            message: message.into(),
            source: None,
        }
    }

    // --- Storage ---

    /// Create IO error from std::io::Error
    pub fn io_from_error(context: impl Into<String>, err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorCode::StorageWriteError,
            _ => ErrorCode::StorageReadError,
        };

        Self::Io {
            code,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create storage write error
    pub fn storage_write(context: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            code: ErrorCode::StorageWriteError,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create directory error
    pub fn directory(context: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            code: ErrorCode::DirectoryError,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    // --- Configuration ---

    /// Create configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration error with source
    pub fn config_from_error(err: config::ConfigError) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create invalid endpoint error
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::InvalidEndpoint,
            message: message.into(),
            source: None,
        }
    }

    // --- Validation ---

    /// Create invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    /// Create invalid header error
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidHeader,
            message: message.into(),
        }
    }

    // --- UI ---

    /// Create UI error
    pub fn ui(message: impl Into<String>) -> Self {
        Self::Ui {
            code: ErrorCode::DialogError,
            message: message.into(),
        }
    }

    /// Create user cancelled error
    pub fn user_cancelled() -> Self {
        Self::Ui {
            code: ErrorCode::UserCancelled,
            message: "Operation cancelled by user".to_string(),
        }
    }

    // --- Utility Methods ---

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SessionExpired { code, .. } => *code,
            Self::Forbidden { code, .. } => *code,
            Self::Authentication { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::RequestFailed { code, .. } => *code,
            Self::Io { code, .. } => *code,
            Self::Config { code, .. } => *code,
            Self::InvalidInput { code, .. } => *code,
            Self::Ui { code, .. } => *code,
            Self::Serialization { code, .. } => *code,
        }
    }

    /// HTTP status for errors that came from a server response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SessionExpired { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The session is gone; the user has to log in again
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// No response was received
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

// ==================== From Implementations ====================

impl From<std::io::Error> for TurnierError {
    fn from(err: std::io::Error) -> Self {
        Self::io_from_error("IO operation", err)
    }
}

impl From<reqwest::Error> for TurnierError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_from_reqwest(err)
    }
}

impl From<serde_json::Error> for TurnierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<config::ConfigError> for TurnierError {
    fn from(err: config::ConfigError) -> Self {
        Self::config_from_error(err)
    }
}

impl From<dialoguer::Error> for TurnierError {
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                Self::user_cancelled()
            }
            other => Self::ui(format!("Dialog error: {}", other)),
        }
    }
}

impl From<validator::ValidationErrors> for TurnierError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::invalid_input(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for TurnierError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::invalid_header(format!("Invalid header value: {}", err))
    }
}

impl From<reqwest::header::InvalidHeaderName> for TurnierError {
    fn from(err: reqwest::header::InvalidHeaderName) -> Self {
        Self::invalid_header(format!("Invalid header name: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::SessionExpired.code(), 101);
        assert_eq!(ErrorCode::HttpError.code(), 201);
        assert_eq!(ErrorCode::StorageReadError.code(), 301);
        assert_eq!(ErrorCode::ConfigError.code(), 401);
    }

    #[test]
    fn test_error_code_string() {
        assert_eq!(ErrorCode::SessionExpired.as_str(), "T101");
        assert_eq!(ErrorCode::RequestFailed.as_str(), "T204");
    }

    #[test]
    fn test_error_display() {
        let err = TurnierError::request_failed(422, "Division is full");
        let text = err.to_string();
        assert!(text.contains("T204"));
        assert!(text.contains("422"));
        assert!(text.contains("Division is full"));
    }

    #[test]
    fn test_error_status() {
        assert_eq!(TurnierError::session_expired("gone").status(), Some(401));
        assert_eq!(TurnierError::forbidden("no").status(), Some(403));
        assert_eq!(TurnierError::network("offline").status(), None);
    }

    #[test]
    fn test_error_classification() {
        assert!(TurnierError::session_expired("x").is_session_expired());
        assert!(!TurnierError::forbidden("x").is_session_expired());
        assert!(TurnierError::network("x").is_network_error());
        assert!(!TurnierError::request_failed(500, "x").is_network_error());
    }

    #[test]
    fn test_interrupted_prompt_is_cancellation() {
        let interrupted = std::io::Error::new(std::io::ErrorKind::Interrupted, "ctrl-c");
        let err = TurnierError::from(dialoguer::Error::IO(interrupted));
        assert_eq!(err.code(), ErrorCode::UserCancelled);

        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "tty gone");
        let err = TurnierError::from(dialoguer::Error::IO(broken));
        assert_eq!(err.code(), ErrorCode::DialogError);
        assert!(err.to_string().contains("tty gone"));
    }
}

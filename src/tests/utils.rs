//! Test data generators and fixtures

pub mod test_helpers {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::TempDir;

    /// Create a temporary directory for testing
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    /// Replace the directory `dir` with a plain file so writes below it fail
    pub fn break_storage_dir(dir: &Path) {
        std::fs::remove_dir_all(dir).expect("Failed to remove storage dir");
        std::fs::write(dir, "in the way").expect("Failed to write blocking file");
    }

    /// Unsigned token carrying `claims` as its payload
    pub fn make_token(claims: &Value) -> String {
        let header = json!({ "alg": "HS256", "typ": "JWT" });
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    /// Token whose `exp` lies `offset_ms` after `now_ms` (whole seconds)
    pub fn token_expiring_in(now_ms: i64, offset_ms: i64) -> String {
        make_token(&json!({
            "sub": "17",
            "role": "organizer",
            "exp": (now_ms + offset_ms) / 1000,
        }))
    }
}

//! Session token inspection
//!
//! Reads the claims out of a `header.payload.signature` token without checking
//! the signature. Verification is the server's job; the client only needs to
//! know when the token runs out.
//!
//! Claims are in epoch seconds, all comparisons here are in epoch
//! milliseconds.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use turnier_protocol::Claims;

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Why a token could not be read. Never leaves this module.
#[derive(Debug, Error)]
enum DecodeError {
    #[error("expected 3 segments, found {0}")]
    Segments(usize),
    #[error("payload is not base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not a JSON claims object: {0}")]
    Json(#[from] serde_json::Error),
}

fn decode_claims(token: &str) -> Result<Claims, DecodeError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(DecodeError::Segments(parts.len()));
    }

    // Accept standard-alphabet and padded payloads as well as base64url.
    let payload: String = parts[1]
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn seconds_to_millis(seconds: i64) -> i64 {
    seconds.saturating_mul(1000)
}

/// Stateless token interpretation against an injectable clock
#[derive(Debug, Clone)]
pub struct TokenInspector {
    clock: Arc<dyn Clock>,
}

impl Default for TokenInspector {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl TokenInspector {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Claims of `token`, or `None` if it is not a readable token.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        match decode_claims(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!("Token not decodable: {}", e);
                None
            }
        }
    }

    /// Expiry in epoch milliseconds
    fn expiry_millis(&self, token: &str) -> Option<i64> {
        self.decode(token)?.exp.map(seconds_to_millis)
    }

    /// `exp` is present and strictly in the future.
    pub fn is_valid(&self, token: &str) -> bool {
        self.expiry_millis(token)
            .map(|exp_ms| exp_ms > self.now_millis())
            .unwrap_or(false)
    }

    /// Less than `threshold_ms` left. False for undecodable tokens; an
    /// already-expired token counts as expiring soon, so check `is_valid` too.
    pub fn is_expiring_soon(&self, token: &str, threshold_ms: i64) -> bool {
        self.remaining_ms(token)
            .map(|remaining| remaining < threshold_ms)
            .unwrap_or(false)
    }

    /// Milliseconds until expiry, negative once expired
    pub fn remaining_ms(&self, token: &str) -> Option<i64> {
        self.expiry_millis(token)
            .map(|exp_ms| exp_ms.saturating_sub(self.now_millis()))
    }

    pub fn expires_at(&self, token: &str) -> Option<DateTime<Utc>> {
        let exp = self.decode(token)?.exp?;
        DateTime::from_timestamp(exp, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::MockClock;
    use crate::tests::utils::test_helpers::{make_token, token_expiring_in};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::json;

    const NOW_MS: i64 = 1_700_000_000_000;
    const THIRTY_MINUTES_MS: i64 = 1_800_000;

    fn inspector() -> TokenInspector {
        TokenInspector::new(Arc::new(MockClock::new(NOW_MS)))
    }

    mod unit {
        use super::*;
        use base64::Engine as _;

        #[test]
        fn test_decode_reads_claims() {
            let token = make_token(&json!({ "sub": "17", "exp": 1_700_003_600, "role": "admin" }));
            let claims = inspector().decode(&token).unwrap();

            assert_eq!(claims.sub.as_deref(), Some("17"));
            assert_eq!(claims.exp, Some(1_700_003_600));
            assert_eq!(claims.role.as_deref(), Some("admin"));
        }

        #[test]
        fn test_decode_rejects_malformed() {
            let inspector = inspector();
            assert!(inspector.decode("not-a-jwt").is_none());
            assert!(inspector.decode("").is_none());
            assert!(inspector.decode("a.b").is_none());
            assert!(inspector.decode("a.b.c.d").is_none());
            assert!(inspector.decode("header.!!!.sig").is_none());

            let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("plain text"));
            assert!(inspector.decode(&not_json).is_none());

            let not_object = format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2,3]"));
            assert!(inspector.decode(&not_object).is_none());
        }

        #[test]
        fn test_decode_accepts_padded_standard_base64() {
            let payload = json!({ "exp": 1_700_003_600, "note": "??>>" }).to_string();
            let token = format!("h.{}.s", STANDARD.encode(payload));
            let claims = inspector().decode(&token).unwrap();
            assert_eq!(claims.exp, Some(1_700_003_600));
        }

        #[test]
        fn test_malformed_tokens_are_neither_valid_nor_expiring() {
            let inspector = inspector();
            for token in ["not-a-jwt", "", "x.y.z"] {
                assert!(!inspector.is_valid(token));
                assert!(!inspector.is_expiring_soon(token, THIRTY_MINUTES_MS));
            }
        }

        #[test]
        fn test_missing_exp_is_invalid() {
            let token = make_token(&json!({ "sub": "17" }));
            let inspector = inspector();
            assert!(inspector.decode(&token).is_some());
            assert!(!inspector.is_valid(&token));
            assert!(!inspector.is_expiring_soon(&token, THIRTY_MINUTES_MS));
        }

        #[test]
        fn test_is_valid_past_and_future() {
            let inspector = inspector();
            let now_secs = NOW_MS / 1000;

            let expired = make_token(&json!({ "exp": now_secs - 10 }));
            assert!(!inspector.is_valid(&expired));

            let fresh = make_token(&json!({ "exp": now_secs + 3600 }));
            assert!(inspector.is_valid(&fresh));
        }

        #[test]
        fn test_unusual_claim_types_keep_expiry_readable() {
            let inspector = inspector();
            let now_secs = NOW_MS / 1000;

            let numeric_role = make_token(&json!({ "exp": now_secs as f64 + 60.7, "role": 2 }));
            assert!(inspector.is_valid(&numeric_role));
            assert!(inspector.is_expiring_soon(&numeric_role, THIRTY_MINUTES_MS));
            assert_eq!(inspector.remaining_ms(&numeric_role), Some(60_000));

            let list_role = make_token(&json!({
                "exp": now_secs + 3600,
                "iat": 1.5,
                "role": ["a", "b"]
            }));
            assert!(inspector.is_valid(&list_role));
            assert!(!inspector.is_expiring_soon(&list_role, THIRTY_MINUTES_MS));
            let claims = inspector.decode(&list_role).unwrap();
            assert_eq!(claims.iat, Some(1));
            assert!(claims.role.is_none());
        }

        #[test]
        fn test_is_valid_compares_in_milliseconds() {
            // Compared unscaled, a seconds claim reads as long expired.
            let inspector = inspector();
            let one_second_ahead = make_token(&json!({ "exp": NOW_MS / 1000 + 1 }));
            assert!(inspector.is_valid(&one_second_ahead));

            let exactly_now = make_token(&json!({ "exp": NOW_MS / 1000 }));
            assert!(!inspector.is_valid(&exactly_now));
        }

        #[test]
        fn test_expiring_soon_boundary() {
            let inspector = inspector();

            let inside = token_expiring_in(NOW_MS, 1_799_000);
            assert!(inspector.is_expiring_soon(&inside, THIRTY_MINUTES_MS));

            let outside = token_expiring_in(NOW_MS, 1_801_000);
            assert!(!inspector.is_expiring_soon(&outside, THIRTY_MINUTES_MS));

            let exactly = token_expiring_in(NOW_MS, THIRTY_MINUTES_MS);
            assert!(!inspector.is_expiring_soon(&exactly, THIRTY_MINUTES_MS));
        }

        #[test]
        fn test_expired_token_counts_as_expiring_soon() {
            let inspector = inspector();
            let expired = token_expiring_in(NOW_MS, -60_000);
            assert!(inspector.is_expiring_soon(&expired, THIRTY_MINUTES_MS));
            assert!(!inspector.is_valid(&expired));
        }

        #[test]
        fn test_remaining_and_expires_at() {
            let inspector = inspector();
            let token = token_expiring_in(NOW_MS, 60_000);

            assert_eq!(inspector.remaining_ms(&token), Some(60_000));
            assert_eq!(
                inspector.expires_at(&token).unwrap().timestamp_millis(),
                NOW_MS + 60_000
            );
            assert!(inspector.expires_at("garbage").is_none());
        }

        #[test]
        fn test_clock_moves() {
            let clock = Arc::new(MockClock::new(NOW_MS));
            let inspector = TokenInspector::new(clock.clone());
            let token = token_expiring_in(NOW_MS, 5_000);

            assert!(inspector.is_valid(&token));
            clock.advance(5_000);
            assert!(!inspector.is_valid(&token));
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_validity_matches_expiry_sign(offset_secs in -10_000_000i64..10_000_000i64) {
                prop_assume!(offset_secs != 0);
                let token = make_token(&json!({ "exp": NOW_MS / 1000 + offset_secs }));
                prop_assert_eq!(inspector().is_valid(&token), offset_secs > 0);
            }

            #[test]
            fn test_expiring_soon_matches_threshold(
                offset_secs in 1i64..100_000,
                threshold_ms in 0i64..100_000_000,
            ) {
                let token = make_token(&json!({ "exp": NOW_MS / 1000 + offset_secs }));
                prop_assert_eq!(
                    inspector().is_expiring_soon(&token, threshold_ms),
                    offset_secs * 1000 < threshold_ms
                );
            }

            #[test]
            fn test_arbitrary_input_never_panics(s in "\\PC*") {
                let inspector = inspector();
                let _ = inspector.decode(&s);
                let _ = inspector.is_valid(&s);
                let _ = inspector.is_expiring_soon(&s, THIRTY_MINUTES_MS);
            }
        }
    }
}

// src/backend/utils/crypto.rs

use crate::error::SignupError;
use crate::models::common::TesterId;
use crate::models::tester::normalize_email;
use ic_cdk::api::management_canister::main::raw_rand;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length in bytes of per-app secrets before hex encoding.
pub const APP_SECRET_BYTES: usize = 16;

/// Deterministic tester key. Two requests for the same (app, email) always
/// land on the same record, whatever the casing of the email.
pub fn tester_id(app_id: &str, email: &str) -> TesterId {
    let mut hasher = Sha256::new();
    hasher.update(app_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_email(email).as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates random bytes using `raw_rand`.
pub async fn generate_random_bytes(num_bytes: usize) -> Result<Vec<u8>, SignupError> {
    // raw_rand returns 32 bytes per call.
    if num_bytes > 32 {
        return Err(SignupError::InternalError(
            "Cannot request more than 32 random bytes from raw_rand in one call".to_string(),
        ));
    }
    let (bytes,) = raw_rand().await.map_err(|(code, msg)| {
        SignupError::InternalError(format!("raw_rand failed: code={:?}, msg={}", code, msg))
    })?;
    Ok(bytes[..num_bytes].to_vec())
}

/// Generates the secret that authorizes an app's complete link.
pub async fn generate_app_secret() -> Result<String, SignupError> {
    let bytes = generate_random_bytes(APP_SECRET_BYTES).await?;
    Ok(hex::encode(bytes))
}

/// Compares two secrets in constant time for equal lengths.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    a.len() == b.len() && a.ct_eq(b).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tester_id_ignores_email_case_and_whitespace() {
        assert_eq!(
            tester_id("com.example.app", "X@Example.com "),
            tester_id("com.example.app", "x@example.com")
        );
        assert_eq!(tester_id("com.example.app", "x@example.com").len(), 64);
    }

    #[test]
    fn tester_id_is_scoped_by_app() {
        assert_ne!(
            tester_id("com.example.one", "x@example.com"),
            tester_id("com.example.two", "x@example.com")
        );
        // The separator keeps "a" + "bc" apart from "ab" + "c".
        assert_ne!(tester_id("a", "bc"), tester_id("ab", "c"));
    }

    #[test]
    fn secrets_must_match_exactly() {
        assert!(secrets_match("abc123", "abc123"));
        assert!(!secrets_match("abc123", "abc124"));
        assert!(!secrets_match("abc123", "ABC123"));
        assert!(!secrets_match("abc123", "abc12"));
        assert!(!secrets_match("abc123", ""));
    }
}

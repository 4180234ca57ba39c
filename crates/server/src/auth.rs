//! Credential hashing and bearer-token authentication
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 hashes in a PHC-style
//! encoded string. Sessions are random tokens kept server-side; handlers
//! receive the resolved identity through the [`AuthUser`] extractor so
//! user ids are always explicit parameters, never ambient state.

use crate::routes::AppState;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, StatusCode};
use axum::response::Json;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use persistence::repository::SessionRepository;
use rand::RngCore;
use serde_json::{json, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::error;

const PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;
const TOKEN_LENGTH: usize = 32;
const SCHEME: &str = "pbkdf2-sha256";

/// Hash a password for storage.
///
/// Format: `pbkdf2-sha256$<iterations>$<b64 salt>$<b64 hash>`
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);

    format!(
        "{SCHEME}${PBKDF2_ITERATIONS}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    )
}

/// Verify a password against a stored hash string.
/// Unparseable hashes verify as false rather than erroring.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(hash)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != SCHEME || parts.next().is_some() {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        STANDARD_NO_PAD.decode(salt),
        STANDARD_NO_PAD.decode(hash),
    ) else {
        return false;
    };
    if expected.len() != HASH_LENGTH {
        return false;
    }

    let mut derived = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);

    derived.as_slice().ct_eq(expected.as_slice()).into()
}

/// Generate a fresh session token
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LENGTH];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The authenticated caller, resolved from the `Authorization: Bearer`
/// header before any handler logic runs.
pub struct AuthUser {
    pub id: i64,
    pub token: String,
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Authentication required" })),
    )
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_owned)
            .ok_or_else(unauthorized)?;

        match SessionRepository::new(state.db.pool())
            .find_user_id(&token)
            .await
        {
            Ok(Some(id)) => Ok(AuthUser { id, token }),
            Ok(None) => Err(unauthorized()),
            Err(e) => {
                error!("session lookup failed: {e}");
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Database error" })),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let encoded = hash_password("hunter22");
        assert!(encoded.starts_with("pbkdf2-sha256$"));
        assert!(verify_password("hunter22", &encoded));
        assert!(!verify_password("hunter23", &encoded));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("secret");
        let b = hash_password("secret");
        assert_ne!(a, b);
        assert!(verify_password("secret", &a));
        assert!(verify_password("secret", &b));
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!verify_password("secret", ""));
        assert!(!verify_password("secret", "plaintext"));
        assert!(!verify_password("secret", "md5$1$abc$def"));
        assert!(!verify_password("secret", "pbkdf2-sha256$notanumber$AA$AA"));
    }

    #[test]
    fn tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.len() >= 40);
    }
}

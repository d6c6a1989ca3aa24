//! Stateless identity tokens.
//!
//! A token is `base64url(claims_json) "." base64url(hmac_sha256(claims_json))`.
//! The server keeps no session table; validity is the signature plus `exp`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

/// Claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub name: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, name: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user_id,
            name: name.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

fn mac(secret: &[u8]) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret).map_err(|_| TokenError::BadSignature)
}

/// Sign claims into a token string.
pub fn issue(claims: &Claims, secret: &[u8]) -> Result<String, TokenError> {
    let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;
    let mut signer = mac(secret)?;
    signer.update(&payload);
    let signature = signer.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&payload),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Check signature and expiry, returning the claims.
pub fn validate(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Claims, TokenError> {
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| TokenError::Malformed)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;

    let mut verifier = mac(secret)?;
    verifier.update(&payload);
    verifier
        .verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
    if claims.exp <= now.timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn claims(now: DateTime<Utc>) -> Claims {
        Claims::new(Uuid::new_v4(), "alice", now, Duration::hours(24))
    }

    #[test]
    fn issue_then_validate() {
        let now = Utc::now();
        let claims = claims(now);
        let token = issue(&claims, SECRET).unwrap();
        assert_eq!(validate(&token, SECRET, now).unwrap(), claims);
    }

    #[test]
    fn wrong_secret_rejected() {
        let now = Utc::now();
        let token = issue(&claims(now), SECRET).unwrap();
        assert_eq!(
            validate(&token, b"other-secret", now),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn tampered_claims_rejected() {
        let now = Utc::now();
        let token = issue(&claims(now), SECRET).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let mut forged = claims(now);
        forged.name = "mallory".to_string();
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{}.{}", forged_payload, signature);

        assert_eq!(
            validate(&forged_token, SECRET, now),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn expired_rejected() {
        let issued = Utc::now() - Duration::hours(25);
        let token = issue(&claims(issued), SECRET).unwrap();
        assert_eq!(validate(&token, SECRET, Utc::now()), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let now = Utc::now();
        assert_eq!(validate("", SECRET, now), Err(TokenError::Malformed));
        assert_eq!(validate("no-dot", SECRET, now), Err(TokenError::Malformed));
        assert_eq!(validate("!!.??", SECRET, now), Err(TokenError::Malformed));
    }
}

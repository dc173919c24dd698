//! Signed bearer tokens for the gateway's own users.
//!
//! Token form: `user|expiry_unix|hex(hmac-sha256(user|expiry))`. Stateless —
//! nothing to store or revoke server-side; expiry bounds the blast radius of
//! a leaked token.

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub struct TokenAuth {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenAuth {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length")
    }

    pub fn issue(&self, user_id: &str) -> String {
        let expires = (Utc::now() + self.ttl).timestamp();
        let payload = format!("{user_id}|{expires}");
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("{payload}|{signature}")
    }

    /// Returns the user id for a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (payload, signature) = token.rsplit_once('|')?;
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&hex::decode(signature).ok()?).ok()?;

        let (user_id, expires) = payload.rsplit_once('|')?;
        let expires: i64 = expires.parse().ok()?;
        if Utc::now().timestamp() > expires {
            return None;
        }
        Some(user_id.to_string())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_verify_roundtrip() {
        let auth = TokenAuth::new("secret", 1);
        let token = auth.issue("member@example.com");
        assert_eq!(auth.verify(&token).as_deref(), Some("member@example.com"));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = TokenAuth::new("secret", 1);
        let token = auth.issue("member@example.com");
        let forged = token.replace("member@example.com", "admin@example.com");
        assert!(auth.verify(&forged).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenAuth::new("secret-a", 1).issue("member@example.com");
        assert!(TokenAuth::new("secret-b", 1).verify(&token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = TokenAuth::new("secret", -1);
        let token = auth.issue("member@example.com");
        assert!(auth.verify(&token).is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        let auth = TokenAuth::new("secret", 1);
        assert!(auth.verify("").is_none());
        assert!(auth.verify("a|b|c").is_none());
        assert!(auth.verify("no-separators").is_none());
    }
}

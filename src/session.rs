// =============================================================================
// Session Guard: HMAC-SHA256 signed bearer tokens
// =============================================================================
//
// Token layout (all ASCII):
//
//   <username>.<expiry_unix_secs>.<nonce>.<hex(hmac_sha256(secret, payload))>
//
// where `payload` is everything before the final dot.  Usernames may contain
// dots, so parsing splits from the right.
//
// SECURITY: the secret is never logged.  Signature comparison is constant
// time.  Revoked tokens are held in memory until they would have expired.
// =============================================================================

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SessionConfig;

type HmacSha256 = Hmac<Sha256>;

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,
    #[error("invalid session signature")]
    BadSignature,
    #[error("session expired")]
    Expired,
    #[error("session revoked")]
    Revoked,
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Freshly issued session handed back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until expiry.
    pub expires_in: u64,
    pub username: String,
}

/// Claims recovered from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub username: String,
    pub expires_at: i64,
}

/// Issues, verifies and revokes session tokens.
pub struct SessionGuard {
    secret: Vec<u8>,
    ttl_secs: u64,
    demo_username: String,
    demo_pin: String,
    /// Revoked token -> its expiry.  Entries are dropped once expired.
    revoked: RwLock<HashMap<String, i64>>,
}

impl SessionGuard {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            secret: config.secret.as_bytes().to_vec(),
            ttl_secs: config.expiration_hours.saturating_mul(3600),
            demo_username: config.demo_username.clone(),
            demo_pin: config.demo_pin.clone(),
            revoked: RwLock::new(HashMap::new()),
        }
    }

    /// Check credentials against the configured demo account and issue a
    /// token on success.
    pub fn login(&self, username: &str, pin: &str) -> Result<IssuedSession, SessionError> {
        let user_ok = constant_time_eq(username.as_bytes(), self.demo_username.as_bytes());
        let pin_ok = constant_time_eq(pin.as_bytes(), self.demo_pin.as_bytes());
        if !(user_ok && pin_ok) {
            warn!(username, "login rejected");
            return Err(SessionError::InvalidCredentials);
        }
        Ok(self.issue(username))
    }

    /// Issue a token for `username` with the configured lifetime.
    pub fn issue(&self, username: &str) -> IssuedSession {
        self.issue_at(username, Utc::now().timestamp())
    }

    fn issue_at(&self, username: &str, now: i64) -> IssuedSession {
        let expiry = now.saturating_add(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX));
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let payload = format!("{username}.{expiry}.{nonce}");
        let token = format!("{payload}.{}", self.sign(&payload));

        debug!(username, expiry, "session issued");

        IssuedSession {
            access_token: token,
            token_type: "Bearer",
            expires_in: self.ttl_secs,
            username: username.to_string(),
        }
    }

    /// Validate a token's signature, expiry and revocation state.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, SessionError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(SessionError::Malformed)?;

        let mut parts = payload.rsplitn(3, '.');
        let _nonce = parts.next().filter(|n| !n.is_empty()).ok_or(SessionError::Malformed)?;
        let expiry: i64 = parts
            .next()
            .and_then(|e| e.parse().ok())
            .ok_or(SessionError::Malformed)?;
        let username = parts.next().filter(|u| !u.is_empty()).ok_or(SessionError::Malformed)?;

        let expected = self.sign(payload);
        if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
            return Err(SessionError::BadSignature);
        }
        if self.revoked.read().contains_key(token) {
            return Err(SessionError::Revoked);
        }
        if expiry <= now {
            return Err(SessionError::Expired);
        }

        Ok(SessionClaims {
            username: username.to_string(),
            expires_at: expiry,
        })
    }

    /// Revoke a valid token.  Revoking an already revoked token is an error.
    pub fn revoke(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.revoke_at(token, Utc::now().timestamp())
    }

    fn revoke_at(&self, token: &str, now: i64) -> Result<SessionClaims, SessionError> {
        let claims = self.verify_at(token, now)?;

        let mut revoked = self.revoked.write();
        // Expired tokens fail verification anyway; keep the set bounded.
        revoked.retain(|_, expires_at| *expires_at > now);
        revoked.insert(token.to_string(), claims.expires_at);
        drop(revoked);

        debug!(username = %claims.username, "session revoked");
        Ok(claims)
    }

    fn sign(&self, payload: &str) -> String {
        // HMAC accepts keys of any length, so this never fails.
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("revoked", &self.revoked.read().len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Constant-time comparison
// =============================================================================

/// Compare two byte slices without short-circuiting on the first mismatch.
/// A length difference returns early; lengths are not secret here.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

// =============================================================================
// Tests
// =============================================================================

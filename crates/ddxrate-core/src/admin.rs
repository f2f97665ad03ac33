//! Admin authentication for mutating study operations.
//!
//! Tokens are `expiry.signature` where `signature` is the hex SHA-256
//! of `expiry.secret`. The secret is the admin password from the
//! environment, so a token stays valid until its expiry even across
//! process restarts, and rotating the password revokes everything.

use crate::errors::{Result, StudyError};
use chrono::Utc;
use sha2::{Digest, Sha256};

pub const ADMIN_PASSWORD_ENV: &str = "DDXRATE_ADMIN_PASSWORD";
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// The configured admin password; unset or empty is a config error.
pub fn admin_secret() -> Result<String> {
    match std::env::var(ADMIN_PASSWORD_ENV) {
        Ok(secret) if !secret.is_empty() => Ok(secret),
        _ => Err(StudyError::Config(format!(
            "{} is not set",
            ADMIN_PASSWORD_ENV
        ))),
    }
}

/// Exchange the admin password for a signed token.
pub fn login(password: &str, ttl_secs: i64) -> Result<String> {
    let secret = admin_secret()?;
    if password != secret {
        return Err(StudyError::Unauthorized("wrong admin password".into()));
    }
    Ok(issue_token(&secret, ttl_secs))
}

/// Gate for mutating operations: a present, well-signed, unexpired
/// token or an Unauthorized error.
pub fn require_admin(token: Option<&str>) -> Result<()> {
    let secret = admin_secret()?;
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StudyError::Unauthorized("admin token required".into()))?;
    verify_token_at(token, &secret, Utc::now().timestamp())
}

pub fn issue_token(secret: &str, ttl_secs: i64) -> String {
    let expiry = Utc::now().timestamp() + ttl_secs;
    format!("{}.{}", expiry, sign(expiry, secret))
}

pub fn verify_token(token: &str, secret: &str) -> Result<()> {
    verify_token_at(token, secret, Utc::now().timestamp())
}

fn verify_token_at(token: &str, secret: &str, now: i64) -> Result<()> {
    let (expiry_part, signature) = token
        .split_once('.')
        .ok_or_else(|| StudyError::Unauthorized("malformed admin token".into()))?;
    let expiry: i64 = expiry_part
        .parse()
        .map_err(|_| StudyError::Unauthorized("malformed admin token".into()))?;
    if sign(expiry, secret) != signature {
        return Err(StudyError::Unauthorized(
            "admin token signature mismatch".into(),
        ));
    }
    if now >= expiry {
        return Err(StudyError::Unauthorized("admin token expired".into()));
    }
    Ok(())
}

fn sign(expiry: i64, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(expiry.to_string().as_bytes());
    hasher.update(b".");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let token = issue_token("s3cret", 60);
        assert!(verify_token(&token, "s3cret").is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("s3cret", 60);
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn tampered_expiry_is_rejected() {
        let token = issue_token("s3cret", 60);
        let (expiry, signature) = token.split_once('.').unwrap();
        let expiry: i64 = expiry.parse().unwrap();
        let forged = format!("{}.{}", expiry + 86_400, signature);
        assert!(verify_token(&forged, "s3cret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let expiry = Utc::now().timestamp() + 60;
        let token = format!("{}.{}", expiry, sign(expiry, "s3cret"));
        assert!(verify_token_at(&token, "s3cret", expiry + 1).is_err());
        assert!(verify_token_at(&token, "s3cret", expiry - 1).is_ok());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(verify_token("garbage", "s3cret").is_err());
        assert!(verify_token("notanumber.abcdef", "s3cret").is_err());
        assert!(verify_token("", "s3cret").is_err());
    }
}

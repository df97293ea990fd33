//! Unverified JWT expiry check.
//!
//! Decodes the payload segment of a JWT and compares its `exp` claim with the
//! current time. The signature is NOT checked: this only saves a doomed
//! connection attempt. The server re-validates the token on every connection
//! and every tenant-scoped request.

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Result};

// ============================================================================
// TokenClaims
// ============================================================================

/// Claims read from an unverified token payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,

    /// Subject.
    #[serde(default)]
    pub sub: Option<String>,
}

/// Decodes the payload segment of a JWT without verifying it.
///
/// # Errors
///
/// - [`Error::Protocol`] if the token does not have three segments
/// - [`Error::Protocol`] if the payload is not valid base64url
/// - [`Error::Json`] if the payload is not a JSON object
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(Error::protocol("Token is not a three-segment JWT")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::protocol(format!("Token payload is not base64url: {e}")))?;

    Ok(serde_json::from_slice(&bytes)?)
}

/// Returns `true` if the token is expired at `now_secs`.
///
/// Undecodable tokens count as expired. Tokens without `exp` never expire.
#[must_use]
pub fn is_expired_at(token: &str, now_secs: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.exp.is_some_and(|exp| exp <= now_secs),
        Err(_) => true,
    }
}

/// Returns `true` if the token is expired now.
#[must_use]
pub fn is_expired(token: &str) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    is_expired_at(token, now)
}

// ============================================================================
// Tests
// ============================================================================

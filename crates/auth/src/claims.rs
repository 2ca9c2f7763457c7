use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lms_core::UserId;

/// JWT claims model (transport-agnostic).
///
/// Timestamps are carried as whole seconds since the epoch, as registered JWT
/// claims require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the account the token was issued to.
    pub sub: UserId,

    /// Issued-at timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("credentials changed after the token was issued")]
    CredentialsChanged,
}

/// Deterministically validate JWT claims.
///
/// This validates the *claims* only; signature verification happens in
/// [`crate::token`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Reject tokens issued before the account's last password change.
///
/// Compared at whole-second resolution, matching the precision of `iat`.
pub fn ensure_issued_after_password_change(
    claims: &JwtClaims,
    password_changed_at: Option<DateTime<Utc>>,
) -> Result<(), TokenValidationError> {
    match password_changed_at {
        Some(changed) if changed.timestamp() > claims.iat.timestamp() => {
            Err(TokenValidationError::CredentialsChanged)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_at(iat: DateTime<Utc>, ttl: Duration) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            iat,
            exp: iat + ttl,
        }
    }

    #[test]
    fn valid_within_window() {
        let now = Utc::now();
        let c = claims_at(now - Duration::minutes(1), Duration::minutes(10));
        assert_eq!(validate_claims(&c, now), Ok(()));
    }

    #[test]
    fn expired_at_boundary() {
        let now = Utc::now();
        let c = claims_at(now - Duration::minutes(10), Duration::minutes(10));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn future_token_is_not_yet_valid() {
        let now = Utc::now();
        let c = claims_at(now + Duration::minutes(5), Duration::minutes(10));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let c = claims_at(now, Duration::minutes(-1));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn token_issued_before_password_change_is_rejected() {
        let now = Utc::now();
        let c = claims_at(now - Duration::hours(1), Duration::hours(24));
        assert_eq!(
            ensure_issued_after_password_change(&c, Some(now)),
            Err(TokenValidationError::CredentialsChanged)
        );
    }

    #[test]
    fn token_issued_after_password_change_is_accepted() {
        let now = Utc::now();
        let c = claims_at(now, Duration::hours(24));
        assert_eq!(
            ensure_issued_after_password_change(&c, Some(now - Duration::hours(1))),
            Ok(())
        );
        assert_eq!(ensure_issued_after_password_change(&c, None), Ok(()));
    }

    #[test]
    fn same_second_change_keeps_token_valid() {
        let now = Utc::now();
        let c = claims_at(now, Duration::hours(1));
        assert_eq!(ensure_issued_after_password_change(&c, Some(now)), Ok(()));
    }
}

//! HS256 bearer token issuance and verification.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use lms_core::UserId;

use crate::{AuthError, JwtClaims, validate_claims};

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: JwtClaims,
}

/// Signs and verifies bearer tokens.
///
/// Verification covers signature and time window only; account-level checks
/// (subject still exists, password unchanged) need the user store and happen
/// in the API session layer.
pub trait TokenService: Send + Sync {
    fn issue(&self, subject: UserId, now: DateTime<Utc>) -> Result<IssuedToken, AuthError>;

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError>;

    fn ttl(&self) -> Duration;
}

pub struct Hs256TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time window is checked by `validate_claims` so the error is typed.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        validation
    }
}

impl TokenService for Hs256TokenService {
    fn issue(&self, subject: UserId, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let iat = now.trunc_subsecs(0);
        let claims = JwtClaims {
            sub: subject,
            iat,
            exp: iat + self.ttl,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &Self::validation()).map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> Hs256TokenService {
        Hs256TokenService::new(secret.as_bytes(), Duration::minutes(30))
    }

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let svc = service("s3cret");
        let user = UserId::new();
        let now = Utc::now();

        let issued = svc.issue(user, now).unwrap();
        let claims = svc.verify(&issued.token, now).unwrap();

        assert_eq!(claims.sub, user);
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.exp - claims.iat, Duration::minutes(30));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let now = Utc::now();
        let issued = service("one").issue(UserId::new(), now).unwrap();
        assert_eq!(service("two").verify(&issued.token, now), Err(AuthError::InvalidToken));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service("s3cret");
        let now = Utc::now();
        let mut token = svc.issue(UserId::new(), now).unwrap().token;
        token.push('x');
        assert_eq!(svc.verify(&token, now), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let svc = service("s3cret");
        let issued_at = Utc::now() - Duration::hours(2);
        let issued = svc.issue(UserId::new(), issued_at).unwrap();
        assert_eq!(svc.verify(&issued.token, Utc::now()), Err(AuthError::Expired));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(service("s").verify("not.a.jwt", Utc::now()), Err(AuthError::InvalidToken));
    }
}

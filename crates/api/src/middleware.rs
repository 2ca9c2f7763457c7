use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use lms_auth::AuthError;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{AuthOutcome, PrincipalContext};

/// Name of the session cookie carrying the token.
pub const TOKEN_COOKIE: &str = "jwt";

/// Resolve the caller once per request and record the outcome.
///
/// Never rejects by itself: routes decide through [`Authenticated`] or
/// [`MaybeAuthenticated`] whether credentials are required.
pub async fn resolve_principal(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let outcome = match extract_token(req.headers()) {
        None => AuthOutcome::Anonymous,
        Some(token) => match services.principal_from_token(&token).await {
            Ok(ctx) => AuthOutcome::Authenticated(ctx),
            Err(e) => {
                debug!(error = %e, "credentials rejected");
                AuthOutcome::Rejected(e)
            }
        },
    };

    req.extensions_mut().insert(outcome);
    next.run(req).await
}

/// Bearer header first, then the session cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer(headers)
        .or_else(|| extract_cookie(headers, TOKEN_COOKIE))
        .map(str::to_string)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// `Set-Cookie` value for the session cookie.
pub fn session_cookie(value: &str, max_age_secs: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!("{TOKEN_COOKIE}={value}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| ApiError::internal(format!("invalid cookie: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Extractors
// ─────────────────────────────────────────────────────────────────────────────

/// The caller must present valid credentials.
pub struct Authenticated(pub PrincipalContext);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthOutcome>() {
            Some(AuthOutcome::Authenticated(ctx)) => Ok(Self(ctx.clone())),
            Some(AuthOutcome::Rejected(e)) => Err(e.clone()),
            Some(AuthOutcome::Anonymous) | None => Err(AuthError::MissingToken.into()),
        }
    }
}

/// Public routes: anonymous callers (and stale credentials) read as `None`.
pub struct MaybeAuthenticated(pub Option<PrincipalContext>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeAuthenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthOutcome>() {
            Some(AuthOutcome::Authenticated(ctx)) => Ok(Self(Some(ctx.clone()))),
            Some(AuthOutcome::Rejected(_) | AuthOutcome::Anonymous) | None => Ok(Self(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_header_takes_precedence_over_cookie() {
        let h = headers(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "jwt=from-cookie"),
        ]);
        assert_eq!(extract_token(&h).as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let h = headers(&[(header::COOKIE, "theme=dark; jwt=abc.def.ghi; other=1")]);
        assert_eq!(extract_token(&h).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn malformed_or_empty_credentials_are_absent() {
        assert_eq!(extract_token(&headers(&[(header::AUTHORIZATION, "Basic xyz")])), None);
        assert_eq!(extract_token(&headers(&[(header::AUTHORIZATION, "Bearer   ")])), None);
        assert_eq!(extract_token(&headers(&[(header::COOKIE, "jwt=")])), None);
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[test]
    fn secure_flag_only_when_requested() {
        let plain = session_cookie("t", 60, false).unwrap();
        assert!(plain.to_str().unwrap().contains("HttpOnly"));
        assert!(!plain.to_str().unwrap().contains("Secure"));
        let secure = session_cookie("t", 60, true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));
    }
}

//! Consistent error responses.
//!
//! Every failure leaves a handler as an [`ApiError`]. The response body is the
//! production envelope `{status, message}`; in development
//! [`render_errors`] re-renders it with the kind and the full error.

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use lms_auth::{AuthError, AuthzError, PasswordError};
use lms_core::DomainError;
use lms_infra::StoreError;
use lms_payments::{PaymentError, WebhookError};

use crate::config::AppEnv;

pub type ApiResult<T> = Result<T, ApiError>;

const GENERIC_MESSAGE: &str = "something went very wrong";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Authentication(_) => ErrorKind::Authentication,
            ApiError::Authorization(_) => ErrorKind::Authorization,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Conflict(_) => ErrorKind::Conflict,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show a caller in production.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => GENERIC_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Attached to error responses so [`render_errors`] can re-render them.
#[derive(Debug, Clone)]
struct ErrorReport {
    kind: ErrorKind,
    message: String,
    debug: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            error!(error = %self, "request failed");
        }

        let mut response = json_error(kind.status(), self.public_message());
        response.extensions_mut().insert(ErrorReport {
            kind,
            message: self.to_string(),
            debug: format!("{self:?}"),
        });
        response
    }
}

fn envelope_status(status: StatusCode) -> &'static str {
    if status.is_client_error() { "fail" } else { "error" }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "status": envelope_status(status),
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Development builds show the error kind and the full error.
pub async fn render_errors(State(env): State<AppEnv>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    if env == AppEnv::Production {
        return response;
    }

    match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => {
            let status = response.status();
            (
                status,
                Json(json!({
                    "status": envelope_status(status),
                    "message": report.message,
                    "kind": report.kind,
                    "error": report.debug,
                })),
            )
                .into_response()
        }
        None => response,
    }
}

pub async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server", uri.path()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions from library errors
// ─────────────────────────────────────────────────────────────────────────────

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            e @ DomainError::InvalidId(_) => ApiError::Validation(e.to_string()),
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Forbidden(msg) => ApiError::Authorization(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::OwnershipChanged(msg) => ApiError::Authorization(msg),
            StoreError::Domain(e) => e.into(),
            e @ StoreError::Backend(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        if value.is_operational() {
            ApiError::Authentication(value.to_string())
        } else {
            ApiError::Internal(value.to_string())
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        let AuthzError::Forbidden(msg) = value;
        ApiError::Authorization(msg)
    }
}

impl From<PasswordError> for ApiError {
    fn from(value: PasswordError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<PaymentError> for ApiError {
    fn from(value: PaymentError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<WebhookError> for ApiError {
    fn from(value: WebhookError) -> Self {
        ApiError::Validation(format!("Webhook error: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (ApiError::validation("x"), StatusCode::BAD_REQUEST),
            (ApiError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.kind().status(), status);
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(StoreError::backend("connection refused on 10.0.0.3"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), GENERIC_MESSAGE);
    }

    #[test]
    fn ownership_race_is_forbidden() {
        let err = ApiError::from(StoreError::OwnershipChanged("gone".into()));
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn auth_errors_are_unauthorized_unless_server_side() {
        assert_eq!(ApiError::from(AuthError::Expired).kind(), ErrorKind::Authentication);
        assert_eq!(
            ApiError::from(AuthError::Signing("boom".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn webhook_failures_are_bad_requests() {
        let err = ApiError::from(WebhookError::SignatureMismatch);
        assert_eq!(err.kind().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn envelope_status_splits_client_and_server_faults() {
        assert_eq!(envelope_status(StatusCode::NOT_FOUND), "fail");
        assert_eq!(envelope_status(StatusCode::INTERNAL_SERVER_ERROR), "error");
    }
}

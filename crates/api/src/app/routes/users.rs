use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use lms_auth::{NewUser, Role, User, authorize_provisioning, user::validate_password};

use crate::app::dto::{
    self, ChangePasswordRequest, CreateUserRequest, JsonBody, LoginRequest, PathIds, UserPath,
};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::middleware::{Authenticated, session_cookie};

/// Lifetime of the `loggedout` placeholder cookie.
const LOGOUT_COOKIE_SECS: i64 = 10;

pub fn router() -> Router {
    Router::new()
        .route("/users/login", post(login))
        .route("/users/logout", get(logout))
        .route("/users/me", get(me))
        .route("/users/me/password", patch(change_password))
        .route("/users", post(create_user).get(list_users))
        .route("/users/:user_id", get(get_user))
        .route("/users/:user_id/deactivate", patch(deactivate_user))
}

/// Token in the body and in the session cookie.
fn token_response(services: &AppServices, status: StatusCode, user: &User) -> ApiResult<Response> {
    let issued = services.issue_token(user)?;
    let cookie = session_cookie(
        &issued.token,
        services.settings.cookie_max_age_secs(),
        services.settings.is_production(),
    )?;

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "status": "success",
            "token": issued.token,
            "data": { "user": user.profile() },
        })),
    )
        .into_response())
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> ApiResult<Response> {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(ApiError::validation("Please provide email and password"));
    };
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::validation("Please provide email and password"));
    }

    let user = services.authenticate(&email, &password).await?;
    info!(user_id = %user.id, "login");
    token_response(&services, StatusCode::OK, &user)
}

pub async fn logout(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Response> {
    let cookie = session_cookie("loggedout", LOGOUT_COOKIE_SECS, services.settings.is_production())?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "status": "success" })),
    )
        .into_response())
}

pub async fn me(Authenticated(ctx): Authenticated) -> Response {
    dto::ok(json!({ "user": ctx.profile() }))
}

/// Rotate the caller's password. Tokens issued before now stop working;
/// the response carries a fresh one.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> ApiResult<Response> {
    let user = ctx.user();
    let current_ok = services
        .verify_password(body.current_password, Some(user.password_hash.clone()))
        .await?;
    if !current_ok {
        return Err(ApiError::Authentication("Your current password is wrong".to_string()));
    }
    validate_password(&body.new_password)?;

    let hash = services.hash_password(body.new_password).await?;
    let updated = services.users.update_password(user.id, hash, Utc::now()).await?;
    info!(user_id = %updated.id, "password changed");

    token_response(&services, StatusCode::OK, &updated)
}

/// Provision an account. Instructors may only create students.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> ApiResult<Response> {
    let role = body.role.unwrap_or(Role::Student);
    authorize_provisioning(ctx.principal(), role)?;

    let new_user = NewUser::parse(
        &body.name,
        &body.email,
        &body.password,
        role,
        body.roll_number.as_deref(),
    )?;
    let hash = services.hash_password(body.password).await?;
    let user = services
        .users
        .insert_user(new_user.into_user(hash, Some(ctx.principal().id), Utc::now()))
        .await?;

    info!(user_id = %user.id, role = %user.role, created_by = %ctx.principal().id, "account provisioned");
    Ok(dto::ok(json!({ "user": user.profile() })))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
) -> ApiResult<Response> {
    authz::require_staff(ctx.principal())?;

    let users = services
        .users
        .list_active_users()
        .await?
        .iter()
        .map(User::profile)
        .collect::<Vec<_>>();
    Ok(dto::listing("users", &users))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<UserPath>,
) -> ApiResult<Response> {
    authz::require_staff(ctx.principal())?;

    let user = services
        .users
        .find_user(path.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No user found with that ID"))?;
    Ok(dto::ok(json!({ "user": user.profile() })))
}

/// Accounts are never deleted, only deactivated.
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<UserPath>,
) -> ApiResult<Response> {
    authz::require_admin(ctx.principal())?;
    if path.user_id == ctx.principal().id {
        return Err(ApiError::validation("You cannot deactivate your own account"));
    }

    let user = services.users.set_active(path.user_id, false).await?;
    info!(user_id = %user.id, by = %ctx.principal().id, "account deactivated");
    Ok(dto::ok(json!({ "user": user.profile() })))
}

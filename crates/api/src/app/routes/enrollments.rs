use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use lms_auth::authorize_enrollment;
use lms_core::UserId;
use lms_enrollment::{Enrollment, EnrollmentSource};
use lms_infra::Resource;

use crate::app::dto::{self, CoursePath, EnrollRequest, PathIds, optional_json};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;
use crate::middleware::Authenticated;

pub fn router() -> Router {
    Router::new()
        .route("/courses/:course_id/enroll", post(enroll).delete(unenroll))
        .route("/courses/:course_id/enroll/students", get(list_students))
        .route("/courses/:course_id/progress", get(course_progress))
        .route("/enrollments/my-courses", get(my_courses))
}

/// Who the request enrolls: `userId` from the body, else the caller. The
/// caller must be that user, an admin, or the course owner.
async fn enrollment_target(
    services: &AppServices,
    ctx: &PrincipalContext,
    path: &CoursePath,
    body: &Bytes,
) -> ApiResult<UserId> {
    let request: EnrollRequest = optional_json(body)?;
    let chain = authz::resolve(services, Resource::Course(path.course_id)).await?;
    let target = request.user_id.unwrap_or(ctx.principal().id);

    authorize_enrollment(ctx.principal(), target, chain.instructor_id)?;
    Ok(target)
}

pub async fn enroll(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
    body: Bytes,
) -> ApiResult<Response> {
    let target = enrollment_target(&services, &ctx, &path, &body).await?;
    if services.users.find_user(target).await?.is_none() {
        return Err(ApiError::not_found("No user found with that ID"));
    }

    let source = if target == ctx.principal().id {
        EnrollmentSource::SelfService
    } else {
        EnrollmentSource::Managed
    };
    let enrollment = services
        .enrollments
        .enroll(Enrollment::new(target, path.course_id, source, Utc::now()))
        .await?;

    info!(user_id = %target, course_id = %path.course_id, source = source.as_str(), "enrolled");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Enrollment successful",
            "data": { "enrollment": enrollment },
        })),
    )
        .into_response())
}

pub async fn unenroll(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
    body: Bytes,
) -> ApiResult<Response> {
    let target = enrollment_target(&services, &ctx, &path, &body).await?;
    services.enrollments.unenroll(target, path.course_id).await?;

    info!(user_id = %target, course_id = %path.course_id, by = %ctx.principal().id, "unenrolled");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Roster for the course owner and admins.
pub async fn list_students(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
) -> ApiResult<Response> {
    let chain = authz::resolve(&services, Resource::Course(path.course_id)).await?;
    authz::require_course_staff(ctx.principal(), &chain)?;

    let students = services.enrollments.list_course_students(path.course_id).await?;
    Ok(dto::listing("students", &students))
}

pub async fn my_courses(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
) -> ApiResult<Response> {
    let courses = services.enrollments.list_user_courses(ctx.principal().id).await?;
    Ok(dto::listing("courses", &courses))
}

/// The caller's completed lessons in a course.
pub async fn course_progress(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
) -> ApiResult<Response> {
    authz::resolve(&services, Resource::Course(path.course_id)).await?;

    let progress = services
        .enrollments
        .list_progress(ctx.principal().id, path.course_id)
        .await?;
    Ok(dto::listing("progress", &progress))
}

use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use lms_auth::Action;
use lms_courses::{CoursePatch, Lesson, NewCourse};
use lms_infra::{InstructorInfo, Resource};

use crate::app::dto::{
    self, CourseDetail, CoursePath, CreateCourseRequest, JsonBody, ModuleOutline, PathIds,
};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::middleware::{Authenticated, MaybeAuthenticated};

pub fn router() -> Router {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/:course_id",
            get(get_course).patch(update_course).delete(delete_course),
        )
}

/// Public catalogue of published courses.
pub async fn list_courses(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Response> {
    let courses = services.content.list_published_courses().await?;
    Ok(dto::listing("courses", &courses))
}

pub async fn create_course(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    JsonBody(body): JsonBody<CreateCourseRequest>,
) -> ApiResult<Response> {
    authz::authorize_new_course(ctx.principal())?;

    let new_course = NewCourse::parse(&body.title, body.description, body.published, body.price)?;
    let course = services
        .content
        .insert_course(new_course.into_course(ctx.principal().id, Utc::now()))
        .await?;

    info!(course_id = %course.id, instructor_id = %course.instructor_id, "course created");
    Ok(dto::created(json!({ "course": course })))
}

/// Course with instructor and outline. Lessons are summaries here; payloads
/// are served by the lesson routes behind the access check.
pub async fn get_course(
    Extension(services): Extension<Arc<AppServices>>,
    MaybeAuthenticated(ctx): MaybeAuthenticated,
    PathIds(path): PathIds<CoursePath>,
) -> ApiResult<Response> {
    let course = services
        .content
        .find_course(path.course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No course found with that ID"))?;
    authz::ensure_visible(&course, ctx.as_ref().map(|c| c.principal()))?;

    let instructor = services
        .users
        .find_user(course.instructor_id)
        .await?
        .map(|u| InstructorInfo {
            id: u.id,
            name: u.name,
            email: u.email,
        });

    let mut modules = Vec::new();
    for module in services.content.list_modules(course.id).await? {
        let lessons = services
            .content
            .list_lessons(module.id)
            .await?
            .iter()
            .map(Lesson::summary)
            .collect();
        modules.push(ModuleOutline { module, lessons });
    }

    let detail = CourseDetail {
        course,
        instructor,
        modules,
    };
    Ok(dto::ok(json!({ "course": detail })))
}

pub async fn update_course(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
    JsonBody(patch): JsonBody<CoursePatch>,
) -> ApiResult<Response> {
    let chain = authz::resolve(&services, Resource::Course(path.course_id)).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Update, &chain)?;
    patch.validate()?;

    let course = services.content.update_course(path.course_id, guard, &patch).await?;
    info!(course_id = %course.id, by = %ctx.principal().id, "course updated");
    Ok(dto::ok(json!({ "course": course })))
}

/// Cascades to modules, lessons, quizzes, enrollments and progress.
pub async fn delete_course(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
) -> ApiResult<Response> {
    let chain = authz::resolve(&services, Resource::Course(path.course_id)).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Delete, &chain)?;

    services.content.delete_course(path.course_id, guard).await?;
    info!(course_id = %path.course_id, by = %ctx.principal().id, "course deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use lms_auth::{Action, OwnershipChain, Principal};
use lms_courses::{Lesson, LessonDraft, LessonPatch};
use lms_infra::Resource;

use crate::app::dto::{self, JsonBody, LessonPath, ModulePath, PathIds};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::middleware::{Authenticated, MaybeAuthenticated};

pub fn router() -> Router {
    Router::new()
        .route(
            "/courses/:course_id/modules/:module_id/lessons",
            get(list_lessons).post(create_lesson),
        )
        .route(
            "/courses/:course_id/modules/:module_id/lessons/:lesson_id",
            get(get_lesson).patch(update_lesson).delete(delete_lesson),
        )
        .route(
            "/courses/:course_id/modules/:module_id/lessons/:lesson_id/complete",
            post(complete_lesson),
        )
}

async fn module_chain(services: &AppServices, path: &ModulePath) -> ApiResult<OwnershipChain> {
    let chain = authz::resolve(services, Resource::Module(path.module_id)).await?;
    if chain.course_id != path.course_id {
        return Err(ApiError::not_found("No module found with that ID in this course"));
    }
    Ok(chain)
}

async fn load_lesson(services: &AppServices, path: &LessonPath) -> ApiResult<(Lesson, OwnershipChain)> {
    let chain = authz::resolve(services, Resource::Lesson(path.lesson_id)).await?;
    let lesson = services
        .content
        .find_lesson(path.lesson_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No lesson found with that ID"))?;
    if lesson.module_id != path.module_id || chain.course_id != path.course_id {
        return Err(ApiError::not_found("No lesson found with that ID in this module"));
    }
    Ok((lesson, chain))
}

async fn ensure_course_visible(
    services: &AppServices,
    chain: &OwnershipChain,
    viewer: Option<&Principal>,
) -> ApiResult<()> {
    let course = services
        .content
        .find_course(chain.course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No course found with that ID"))?;
    authz::ensure_visible(&course, viewer)
}

/// Lessons of a module. Readers without full access get metadata only.
pub async fn list_lessons(
    Extension(services): Extension<Arc<AppServices>>,
    MaybeAuthenticated(ctx): MaybeAuthenticated,
    PathIds(path): PathIds<ModulePath>,
) -> ApiResult<Response> {
    let viewer = ctx.as_ref().map(|c| c.principal());
    let chain = module_chain(&services, &path).await?;
    ensure_course_visible(&services, &chain, viewer).await?;

    let access = authz::read_access(&services, viewer, &chain).await?;
    let lessons = services
        .content
        .list_lessons(path.module_id)
        .await?
        .iter()
        .map(|l| l.view(access))
        .collect::<Vec<_>>();

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "results": lessons.len(),
            "accessLevel": access,
            "data": { "lessons": lessons },
        })),
    )
        .into_response())
}

pub async fn create_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<ModulePath>,
    JsonBody(draft): JsonBody<LessonDraft>,
) -> ApiResult<Response> {
    let chain = module_chain(&services, &path).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Create, &chain)?;

    let lesson = services
        .content
        .insert_lesson(draft.into_lesson(path.module_id)?, guard)
        .await?;

    info!(lesson_id = %lesson.id, module_id = %lesson.module_id, kind = lesson.lesson_type().as_str(), "lesson created");
    Ok(dto::created(json!({ "lesson": lesson.full() })))
}

pub async fn get_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    MaybeAuthenticated(ctx): MaybeAuthenticated,
    PathIds(path): PathIds<LessonPath>,
) -> ApiResult<Response> {
    let viewer = ctx.as_ref().map(|c| c.principal());
    let (lesson, chain) = load_lesson(&services, &path).await?;
    ensure_course_visible(&services, &chain, viewer).await?;

    let access = authz::read_access(&services, viewer, &chain).await?;
    Ok(dto::ok(json!({ "lesson": lesson.view(access) })))
}

pub async fn update_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<LessonPath>,
    JsonBody(patch): JsonBody<LessonPatch>,
) -> ApiResult<Response> {
    let (_, chain) = load_lesson(&services, &path).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Update, &chain)?;

    let lesson = services.content.update_lesson(path.lesson_id, guard, &patch).await?;
    info!(lesson_id = %lesson.id, by = %ctx.principal().id, "lesson updated");
    Ok(dto::ok(json!({ "lesson": lesson.full() })))
}

pub async fn delete_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<LessonPath>,
) -> ApiResult<Response> {
    let (_, chain) = load_lesson(&services, &path).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Delete, &chain)?;

    services.content.delete_lesson(path.lesson_id, guard).await?;
    info!(lesson_id = %path.lesson_id, by = %ctx.principal().id, "lesson deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Mark the lesson complete for the caller. Marking twice keeps the first
/// completion time.
pub async fn complete_lesson(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<LessonPath>,
) -> ApiResult<Response> {
    let (lesson, chain) = load_lesson(&services, &path).await?;
    authz::require_full_access(
        &services,
        ctx.principal(),
        &chain,
        "Enroll in this course to track progress",
    )
    .await?;

    let progress = services
        .enrollments
        .mark_complete(ctx.principal().id, lesson.id, Utc::now())
        .await?;
    Ok(dto::ok(json!({ "progress": progress })))
}

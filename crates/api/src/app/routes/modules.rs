use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tracing::info;

use lms_auth::{Action, OwnershipChain};
use lms_courses::{CourseModule, Lesson, ModulePatch, NewModule};
use lms_infra::Resource;

use crate::app::dto::{self, CoursePath, CreateModuleRequest, JsonBody, ModuleOutline, ModulePath, PathIds};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::middleware::Authenticated;

pub fn router() -> Router {
    Router::new()
        .route(
            "/courses/:course_id/modules",
            get(list_modules).post(create_module),
        )
        .route(
            "/courses/:course_id/modules/:module_id",
            get(get_module).patch(update_module).delete(delete_module),
        )
}

/// Module addressed under `path`, with its ownership chain. A module that
/// lives under another course is reported missing.
async fn load_module(services: &AppServices, path: &ModulePath) -> ApiResult<(CourseModule, OwnershipChain)> {
    let chain = authz::resolve(services, Resource::Module(path.module_id)).await?;
    if chain.course_id != path.course_id {
        return Err(ApiError::not_found("No module found with that ID in this course"));
    }
    let module = services
        .content
        .find_module(path.module_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No module found with that ID"))?;
    Ok((module, chain))
}

async fn outline(services: &AppServices, module: CourseModule) -> ApiResult<ModuleOutline> {
    let lessons = services
        .content
        .list_lessons(module.id)
        .await?
        .iter()
        .map(Lesson::summary)
        .collect();
    Ok(ModuleOutline { module, lessons })
}

pub async fn list_modules(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
) -> ApiResult<Response> {
    let course = services
        .content
        .find_course(path.course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No course found with that ID"))?;
    authz::ensure_visible(&course, Some(ctx.principal()))?;

    let mut modules = Vec::new();
    for module in services.content.list_modules(course.id).await? {
        modules.push(outline(&services, module).await?);
    }
    Ok(dto::listing("modules", &modules))
}

pub async fn create_module(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<CoursePath>,
    JsonBody(body): JsonBody<CreateModuleRequest>,
) -> ApiResult<Response> {
    let chain = authz::resolve(&services, Resource::Course(path.course_id)).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Create, &chain)?;

    let order = match body.order {
        Some(order) => order,
        None => services
            .content
            .list_modules(path.course_id)
            .await?
            .iter()
            .map(|m| m.order)
            .max()
            .map_or(1, |max| max + 1),
    };
    let new_module = NewModule::parse(&body.title, order)?;
    let module = services
        .content
        .insert_module(new_module.into_module(path.course_id), guard)
        .await?;

    info!(module_id = %module.id, course_id = %module.course_id, order = module.order, "module created");
    Ok(dto::created(json!({ "module": module })))
}

pub async fn get_module(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<ModulePath>,
) -> ApiResult<Response> {
    let (module, _) = load_module(&services, &path).await?;
    let course = services
        .content
        .find_course(path.course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No course found with that ID"))?;
    authz::ensure_visible(&course, Some(ctx.principal()))?;

    let outline = outline(&services, module).await?;
    Ok(dto::ok(json!({ "module": outline })))
}

pub async fn update_module(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<ModulePath>,
    JsonBody(patch): JsonBody<ModulePatch>,
) -> ApiResult<Response> {
    let (_, chain) = load_module(&services, &path).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Update, &chain)?;

    let module = services.content.update_module(path.module_id, guard, &patch).await?;
    info!(module_id = %module.id, by = %ctx.principal().id, "module updated");
    Ok(dto::ok(json!({ "module": module })))
}

pub async fn delete_module(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<ModulePath>,
) -> ApiResult<Response> {
    let (_, chain) = load_module(&services, &path).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Delete, &chain)?;

    services.content.delete_module(path.module_id, guard).await?;
    info!(module_id = %path.module_id, by = %ctx.principal().id, "module deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

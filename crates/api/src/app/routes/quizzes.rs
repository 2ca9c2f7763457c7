//! Quizzes attach to exactly one node of the content tree, so the same
//! handlers are mounted under a course, a module and a lesson.

use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    response::Response,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use lms_auth::{Action, OwnershipChain};
use lms_courses::AccessLevel;
use lms_infra::Resource;
use lms_quizzes::{NewQuestion, NewQuiz, Quiz, QuizAttempt, QuizParent, score_attempt};

use crate::app::dto::{
    self, AttemptRequest, CreateQuestionRequest, CreateQuizRequest, JsonBody, PathIds, QuizPath,
    QuizScope,
};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::middleware::Authenticated;

const MOUNTS: [&str; 3] = [
    "/courses/:course_id/quizzes",
    "/courses/:course_id/modules/:module_id/quizzes",
    "/courses/:course_id/modules/:module_id/lessons/:lesson_id/quizzes",
];

pub fn router() -> Router {
    MOUNTS.iter().fold(Router::new(), |router, base| {
        router
            .route(base, get(list_quizzes).post(create_quiz))
            .route(&format!("{base}/:quiz_id"), get(get_quiz))
            .route(&format!("{base}/:quiz_id/questions"), post(add_question))
            .route(&format!("{base}/:quiz_id/attempt"), post(submit_attempt))
            .route(&format!("{base}/:quiz_id/attempts/me"), get(my_attempts))
    })
}

/// Check that the module and lesson named in `scope` really sit under its
/// course, and return the most specific node with its chain.
async fn resolve_scope(services: &AppServices, scope: &QuizScope) -> ApiResult<(QuizParent, OwnershipChain)> {
    if let (Some(lesson_id), Some(module_id)) = (scope.lesson_id, scope.module_id) {
        let parent_module = services.content.lesson_module(lesson_id).await?;
        if parent_module.is_some_and(|m| m != module_id) {
            return Err(ApiError::not_found("No lesson found with that ID in this module"));
        }
    }

    let parent = QuizParent::most_specific(Some(scope.course_id), scope.module_id, scope.lesson_id)?;
    let chain = authz::resolve(services, Resource::from(parent)).await?;
    if chain.course_id != scope.course_id {
        return Err(ApiError::not_found("No such content in this course"));
    }
    Ok((parent, chain))
}

/// Quiz addressed by `path`. The quiz must hang directly off the most
/// specific node in the path; anything else is reported missing.
async fn load_quiz(services: &AppServices, path: &QuizPath) -> ApiResult<(Quiz, OwnershipChain)> {
    let (expected_parent, _) = resolve_scope(services, &path.scope()).await?;
    let chain = authz::resolve(services, Resource::Quiz(path.quiz_id)).await?;
    let quiz = services
        .quizzes
        .find_quiz(path.quiz_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No quiz found with that ID"))?;
    if quiz.parent != expected_parent || chain.course_id != path.course_id {
        return Err(ApiError::not_found("No quiz found with that ID here"));
    }
    Ok((quiz, chain))
}

pub async fn list_quizzes(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(scope): PathIds<QuizScope>,
) -> ApiResult<Response> {
    let (parent, chain) = resolve_scope(&services, &scope).await?;
    authz::read_access(&services, Some(ctx.principal()), &chain).await?;

    let quizzes = services
        .quizzes
        .list_quizzes(parent)
        .await?
        .iter()
        .map(Quiz::summary)
        .collect::<Vec<_>>();
    Ok(dto::listing("quizzes", &quizzes))
}

/// Ids in the path win over ids in the body; the most specific one becomes
/// the parent.
pub async fn create_quiz(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(scope): PathIds<QuizScope>,
    JsonBody(body): JsonBody<CreateQuizRequest>,
) -> ApiResult<Response> {
    let scope = QuizScope {
        course_id: scope.course_id,
        module_id: scope.module_id.or(body.module_id),
        lesson_id: scope.lesson_id.or(body.lesson_id),
    };
    let (parent, chain) = resolve_scope(&services, &scope).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Create, &chain)?;

    let new_quiz = NewQuiz::parse(&body.title, body.pass_mark, parent)?;
    let quiz = services
        .quizzes
        .insert_quiz(new_quiz.into_quiz(Utc::now()), guard)
        .await?;

    info!(quiz_id = %quiz.id, parent = ?quiz.parent, "quiz created");
    Ok(dto::created(json!({ "quiz": quiz.view() })))
}

/// Correct answers are never exposed. Readers without full access see the
/// quiz metadata only.
pub async fn get_quiz(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<QuizPath>,
) -> ApiResult<Response> {
    let (quiz, chain) = load_quiz(&services, &path).await?;

    let body = match authz::read_access(&services, Some(ctx.principal()), &chain).await? {
        AccessLevel::Full => json!({ "quiz": quiz.view() }),
        AccessLevel::Restricted => json!({ "quiz": quiz.summary() }),
    };
    Ok(dto::ok(body))
}

pub async fn add_question(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<QuizPath>,
    JsonBody(body): JsonBody<CreateQuestionRequest>,
) -> ApiResult<Response> {
    let (quiz, chain) = load_quiz(&services, &path).await?;
    let guard = authz::authorize_write(ctx.principal(), Action::Update, &chain)?;

    let question = NewQuestion::parse(&body.text, body.question_type, body.points, body.options)?;
    let question = services.quizzes.add_question(quiz.id, question, guard).await?;

    info!(quiz_id = %quiz.id, question_id = %question.id, "question added");
    Ok(dto::created(json!({ "question": question })))
}

/// Score and record one attempt. Only readers with full access may attempt.
pub async fn submit_attempt(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<QuizPath>,
    JsonBody(body): JsonBody<AttemptRequest>,
) -> ApiResult<Response> {
    let (quiz, chain) = load_quiz(&services, &path).await?;
    authz::require_full_access(
        &services,
        ctx.principal(),
        &chain,
        "Enroll in this course to attempt its quizzes",
    )
    .await?;

    let answers = body
        .answers
        .ok_or_else(|| ApiError::validation("Please provide answers as an array."))?;
    let outcome = score_attempt(&quiz, &answers);
    let attempt = services
        .quizzes
        .record_attempt(QuizAttempt::record(ctx.principal().id, quiz.id, outcome, Utc::now()))
        .await?;

    info!(
        quiz_id = %quiz.id,
        user_id = %attempt.user_id,
        score = outcome.score,
        total = outcome.total_points,
        passed = outcome.passed,
        "quiz attempted"
    );
    Ok(dto::ok(json!({
        "score": outcome.score,
        "totalPoints": outcome.total_points,
        "percentage": outcome.percentage,
        "passed": outcome.passed,
        "attempt": attempt,
    })))
}

pub async fn my_attempts(
    Extension(services): Extension<Arc<AppServices>>,
    Authenticated(ctx): Authenticated,
    PathIds(path): PathIds<QuizPath>,
) -> ApiResult<Response> {
    let (quiz, _) = load_quiz(&services, &path).await?;
    let attempts = services.quizzes.list_attempts(ctx.principal().id, quiz.id).await?;
    Ok(dto::listing("attempts", &attempts))
}

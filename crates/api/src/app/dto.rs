use async_trait::async_trait;
use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use lms_auth::Role;
use lms_core::{CourseId, LessonId, ModuleId, QuizId, UserId};
use lms_courses::{Course, CourseModule, LessonSummary};
use lms_infra::InstructorInfo;
use lms_quizzes::{Answer, NewOption, QuestionType};

use crate::app::errors::{ApiError, ApiResult};

// -------------------------
// Extractors
// -------------------------

/// `Json<T>` whose rejections use the error envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `Path<T>` whose rejections use the error envelope.
pub struct PathIds<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathIds<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Decode a body that may legitimately be empty.
pub fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::validation(format!("Invalid JSON body: {e}")))
}

// -------------------------
// Path parameters
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UserPath {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CoursePath {
    pub course_id: CourseId,
}

#[derive(Debug, Deserialize)]
pub struct ModulePath {
    pub course_id: CourseId,
    pub module_id: ModuleId,
}

#[derive(Debug, Deserialize)]
pub struct LessonPath {
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub lesson_id: LessonId,
}

/// Where a quiz route is mounted: under a course, a module or a lesson.
#[derive(Debug, Deserialize)]
pub struct QuizScope {
    pub course_id: CourseId,
    pub module_id: Option<ModuleId>,
    pub lesson_id: Option<LessonId>,
}

#[derive(Debug, Deserialize)]
pub struct QuizPath {
    pub course_id: CourseId,
    pub module_id: Option<ModuleId>,
    pub lesson_id: Option<LessonId>,
    pub quiz_id: QuizId,
}

impl QuizPath {
    pub fn scope(&self) -> QuizScope {
        QuizScope {
            course_id: self.course_id,
            module_id: self.module_id,
            lesson_id: self.lesson_id,
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub roll_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: Option<String>,
    pub published: Option<bool>,
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateModuleRequest {
    pub title: String,
    /// Appended after the last module when absent.
    pub order: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    pub title: String,
    pub pass_mark: Option<i32>,
    pub module_id: Option<ModuleId>,
    pub lesson_id: Option<LessonId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    pub points: Option<i32>,
    #[serde(default)]
    pub options: Vec<NewOption>,
}

#[derive(Debug, Deserialize)]
pub struct AttemptRequest {
    pub answers: Option<Vec<Answer>>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ModuleOutline {
    #[serde(flatten)]
    pub module: CourseModule,
    pub lessons: Vec<LessonSummary>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub instructor: Option<InstructorInfo>,
    pub modules: Vec<ModuleOutline>,
}

pub fn success(status: StatusCode, data: Value) -> Response {
    (status, Json(json!({ "status": "success", "data": data }))).into_response()
}

pub fn ok(data: Value) -> Response {
    success(StatusCode::OK, data)
}

pub fn created(data: Value) -> Response {
    success(StatusCode::CREATED, data)
}

/// List envelope with a `results` count.
pub fn listing<T: Serialize>(key: &str, items: &[T]) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "results": items.len(),
            "data": { key: items },
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_decodes_to_default() {
        let req: EnrollRequest = optional_json(&Bytes::new()).unwrap();
        assert!(req.user_id.is_none());
        let req: EnrollRequest = optional_json(&Bytes::from_static(b"  \n")).unwrap();
        assert!(req.user_id.is_none());
    }

    #[test]
    fn body_with_user_id_decodes() {
        let id = UserId::new();
        let body = Bytes::from(json!({ "userId": id.to_string() }).to_string());
        let req: EnrollRequest = optional_json(&body).unwrap();
        assert_eq!(req.user_id, Some(id));
    }

    #[test]
    fn malformed_body_is_a_validation_error() {
        let err = optional_json::<EnrollRequest>(&Bytes::from_static(b"{nope")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn attempt_accepts_selected_option_alias() {
        let body = json!({ "answers": [
            { "questionId": lms_core::QuestionId::new().to_string(),
              "selectedOptionId": lms_core::OptionId::new().to_string() }
        ]});
        let req: AttemptRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.answers.map(|a| a.len()), Some(1));
    }
}

//! Store contracts.
//!
//! Every hierarchy mutation takes an [`OwnerGuard`]. Implementations
//! re-check the guard against the root course owner atomically with the
//! write, so an ownership change between the authorization decision and
//! the write cannot slip through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use lms_auth::{Principal, Role, User, UserProfile};
use lms_core::{CourseId, LessonId, ModuleId, QuizId, UserId};
use lms_courses::{Course, CourseModule, CoursePatch, Lesson, LessonPatch, ModulePatch};
use lms_enrollment::{Enrollment, LessonProgress};
use lms_quizzes::{NewQuestion, Question, Quiz, QuizAttempt, QuizParent};

use crate::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Who is allowed to own the course a write lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerGuard {
    /// No ownership requirement (admins).
    Any,
    /// The root course must be owned by this instructor.
    Instructor(UserId),
}

impl OwnerGuard {
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.role {
            Role::Admin => OwnerGuard::Any,
            Role::Instructor | Role::Student => OwnerGuard::Instructor(principal.id),
        }
    }

    pub fn check(&self, owner: UserId) -> StoreResult<()> {
        match self {
            OwnerGuard::Any => Ok(()),
            OwnerGuard::Instructor(id) if *id == owner => Ok(()),
            OwnerGuard::Instructor(_) => Err(StoreError::OwnershipChanged(
                "You are no longer the owner of this course".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructorInfo {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// A published course as shown in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseListing {
    #[serde(flatten)]
    pub course: Course,
    pub instructor: InstructorInfo,
    pub module_count: i64,
    pub enrollment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledStudent {
    pub enrolled_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub enrolled_at: DateTime<Utc>,
    pub course: Course,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: User) -> StoreResult<User>;

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_active_users(&self) -> StoreResult<Vec<User>>;

    async fn update_password(
        &self,
        id: UserId,
        password_hash: String,
        changed_at: DateTime<Utc>,
    ) -> StoreResult<User>;

    async fn set_active(&self, id: UserId, active: bool) -> StoreResult<User>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fails with `Conflict` when the derived slug is taken.
    async fn insert_course(&self, course: Course) -> StoreResult<Course>;

    async fn find_course(&self, id: CourseId) -> StoreResult<Option<Course>>;

    async fn list_published_courses(&self) -> StoreResult<Vec<CourseListing>>;

    async fn update_course(
        &self,
        id: CourseId,
        guard: OwnerGuard,
        patch: &CoursePatch,
    ) -> StoreResult<Course>;

    /// Removes the course with everything beneath it.
    async fn delete_course(&self, id: CourseId, guard: OwnerGuard) -> StoreResult<()>;

    /// Owning instructor only.
    async fn course_owner(&self, id: CourseId) -> StoreResult<Option<UserId>>;

    /// Fails with `Conflict` when the order is taken within the course.
    async fn insert_module(&self, module: CourseModule, guard: OwnerGuard)
    -> StoreResult<CourseModule>;

    async fn find_module(&self, id: ModuleId) -> StoreResult<Option<CourseModule>>;

    /// Ordered by `order` ascending.
    async fn list_modules(&self, course_id: CourseId) -> StoreResult<Vec<CourseModule>>;

    async fn update_module(
        &self,
        id: ModuleId,
        guard: OwnerGuard,
        patch: &ModulePatch,
    ) -> StoreResult<CourseModule>;

    async fn delete_module(&self, id: ModuleId, guard: OwnerGuard) -> StoreResult<()>;

    /// Parent course only.
    async fn module_course(&self, id: ModuleId) -> StoreResult<Option<CourseId>>;

    async fn insert_lesson(&self, lesson: Lesson, guard: OwnerGuard) -> StoreResult<Lesson>;

    async fn find_lesson(&self, id: LessonId) -> StoreResult<Option<Lesson>>;

    /// Ordered by `order` ascending.
    async fn list_lessons(&self, module_id: ModuleId) -> StoreResult<Vec<Lesson>>;

    async fn update_lesson(
        &self,
        id: LessonId,
        guard: OwnerGuard,
        patch: &LessonPatch,
    ) -> StoreResult<Lesson>;

    async fn delete_lesson(&self, id: LessonId, guard: OwnerGuard) -> StoreResult<()>;

    /// Parent module only.
    async fn lesson_module(&self, id: LessonId) -> StoreResult<Option<ModuleId>>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Fails with `Conflict` when the pair is already enrolled.
    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<Enrollment>;

    /// Fails with `NotFound` when there is nothing to remove.
    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> StoreResult<()>;

    async fn is_enrolled(&self, user_id: UserId, course_id: CourseId) -> StoreResult<bool>;

    async fn list_course_students(&self, course_id: CourseId) -> StoreResult<Vec<EnrolledStudent>>;

    async fn list_user_courses(&self, user_id: UserId) -> StoreResult<Vec<EnrolledCourse>>;

    /// Idempotent upsert; the first completion time is kept.
    async fn mark_complete(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress>;

    async fn list_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> StoreResult<Vec<LessonProgress>>;
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn insert_quiz(&self, quiz: Quiz, guard: OwnerGuard) -> StoreResult<Quiz>;

    /// The quiz with its ordered questions and options.
    async fn find_quiz(&self, id: QuizId) -> StoreResult<Option<Quiz>>;

    async fn list_quizzes(&self, parent: QuizParent) -> StoreResult<Vec<Quiz>>;

    /// Appends at the end of the quiz.
    async fn add_question(
        &self,
        quiz_id: QuizId,
        question: NewQuestion,
        guard: OwnerGuard,
    ) -> StoreResult<Question>;

    /// Direct parent only.
    async fn quiz_parent(&self, id: QuizId) -> StoreResult<Option<QuizParent>>;

    async fn record_attempt(&self, attempt: QuizAttempt) -> StoreResult<QuizAttempt>;

    /// Newest first.
    async fn list_attempts(&self, user_id: UserId, quiz_id: QuizId)
    -> StoreResult<Vec<QuizAttempt>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_guard_accepts_any_owner() {
        let admin = Principal::new(UserId::new(), Role::Admin);
        assert!(OwnerGuard::for_principal(&admin).check(UserId::new()).is_ok());
    }

    #[test]
    fn instructor_guard_requires_matching_owner() {
        let p = Principal::new(UserId::new(), Role::Instructor);
        let guard = OwnerGuard::for_principal(&p);
        assert!(guard.check(p.id).is_ok());
        assert!(matches!(
            guard.check(UserId::new()),
            Err(StoreError::OwnershipChanged(_))
        ));
    }
}

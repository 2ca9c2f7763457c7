//! Postgres-backed stores.
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | StoreError | Scenario |
//! |-----------------|------------|----------|
//! | `23505` unique violation | `Conflict` | duplicate email, slug, module order, enrollment |
//! | `23503` foreign key violation | `NotFound` | referenced user/course/lesson vanished |
//! | anything else | `Backend` | connection, pool, constraint and decoding failures |
//!
//! ## Ownership guards
//!
//! Guarded writes run in one transaction that first takes a `FOR SHARE`
//! lock on the root course row and checks its `instructor_id`; the course
//! cannot change owner or disappear until the write commits.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use lms_auth::{Role, User};
use lms_core::{AttemptId, CourseId, LessonId, ModuleId, OptionId, QuestionId, QuizId, UserId};
use lms_courses::{
    Course, CourseModule, CoursePatch, Lesson, LessonContent, LessonPatch, LessonType, ModulePatch,
};
use lms_enrollment::{Enrollment, LessonProgress};
use lms_quizzes::{
    NewQuestion, Question, QuestionOption, QuestionType, Quiz, QuizAttempt, QuizParent,
};

use crate::StoreError;
use crate::store::{
    ContentStore, CourseListing, EnrolledCourse, EnrolledStudent, EnrollmentStore, InstructorInfo,
    OwnerGuard, QuizStore, StoreResult, UserStore,
};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

const USER_COLUMNS: &str = "id, name, email, password_hash, role, roll_number, active, \
                            created_by, password_changed_at, created_at";
const COURSE_COLUMNS: &str =
    "id, title, slug, description, instructor_id, published, price, created_at";
const LESSON_COLUMNS: &str =
    "id, module_id, title, \"order\", type, video_url, duration, text_content, file_url";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create any missing tables and indexes.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        debug!("database schema is up to date");
        Ok(())
    }
}

// ─── Error mapping ───────────────────────────────────────────────────────────

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => StoreError::Conflict(conflict_message(db_err.constraint()).to_string()),
            Some("23503") => StoreError::not_found("A referenced record does not exist"),
            _ => StoreError::backend(format!(
                "database error in {operation}: {}",
                db_err.message()
            )),
        },
        _ => StoreError::backend(format!("{operation}: {err}")),
    }
}

fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "A user with that email already exists",
        Some("courses_slug_key") => "A course with that title already exists",
        Some("modules_course_order_key") => "A module with that order already exists in this course",
        Some("enrollments_pkey") => "You are already enrolled in this course",
        _ => "Duplicate field value",
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::backend(format!("corrupt {what} row: {err}"))
}

// ─── Row decoding ────────────────────────────────────────────────────────────

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let decode = || -> Result<User, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(User {
            id: UserId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: Role::from_str(&role).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            roll_number: row.try_get("roll_number")?,
            active: row.try_get("active")?,
            created_by: row
                .try_get::<Option<Uuid>, _>("created_by")?
                .map(UserId::from_uuid),
            password_changed_at: row.try_get("password_changed_at")?,
            created_at: row.try_get("created_at")?,
        })
    };
    decode().map_err(|e| corrupt("user", e))
}

fn course_from_row(row: &PgRow) -> StoreResult<Course> {
    let decode = || -> Result<Course, sqlx::Error> {
        Ok(Course {
            id: CourseId::from_uuid(row.try_get("id")?),
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            instructor_id: UserId::from_uuid(row.try_get("instructor_id")?),
            published: row.try_get("published")?,
            price: row.try_get("price")?,
            created_at: row.try_get("created_at")?,
        })
    };
    decode().map_err(|e| corrupt("course", e))
}

fn module_from_row(row: &PgRow) -> StoreResult<CourseModule> {
    let decode = || -> Result<CourseModule, sqlx::Error> {
        Ok(CourseModule {
            id: ModuleId::from_uuid(row.try_get("id")?),
            course_id: CourseId::from_uuid(row.try_get("course_id")?),
            title: row.try_get("title")?,
            order: row.try_get("order")?,
        })
    };
    decode().map_err(|e| corrupt("module", e))
}

fn lesson_from_row(row: &PgRow) -> StoreResult<Lesson> {
    let decode = || -> Result<_, sqlx::Error> {
        Ok((
            LessonId::from_uuid(row.try_get("id")?),
            ModuleId::from_uuid(row.try_get("module_id")?),
            row.try_get::<String, _>("title")?,
            row.try_get::<i32, _>("order")?,
            row.try_get::<String, _>("type")?,
            row.try_get::<Option<String>, _>("video_url")?,
            row.try_get::<Option<i32>, _>("duration")?,
            row.try_get::<Option<String>, _>("text_content")?,
            row.try_get::<Option<String>, _>("file_url")?,
        ))
    };
    let (id, module_id, title, order, kind, video_url, duration, text_content, file_url) =
        decode().map_err(|e| corrupt("lesson", e))?;
    let kind = LessonType::from_str(&kind).map_err(|e| corrupt("lesson", e))?;
    let content = LessonContent::build(kind, video_url, duration, text_content, file_url)
        .map_err(|e| corrupt("lesson", e))?;
    Ok(Lesson {
        id,
        module_id,
        title,
        order,
        content,
    })
}

/// `(type, video_url, duration, text_content, file_url)` for a payload.
fn lesson_payload(
    content: &LessonContent,
) -> (&'static str, Option<&str>, Option<i32>, Option<&str>, Option<&str>) {
    let kind = content.lesson_type().as_str();
    match content {
        LessonContent::Video { video_url, duration } => {
            (kind, Some(video_url.as_str()), *duration, None, None)
        }
        LessonContent::Text { text_content } => (kind, None, None, Some(text_content.as_str()), None),
        LessonContent::File { file_url } => (kind, None, None, None, Some(file_url.as_str())),
    }
}

fn parent_columns(parent: QuizParent) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
    match parent {
        QuizParent::Course(id) => (Some(*id.as_uuid()), None, None),
        QuizParent::Module(id) => (None, Some(*id.as_uuid()), None),
        QuizParent::Lesson(id) => (None, None, Some(*id.as_uuid())),
    }
}

fn parent_from_row(row: &PgRow) -> StoreResult<QuizParent> {
    let ids = (|| -> Result<_, sqlx::Error> {
        Ok((
            row.try_get::<Option<Uuid>, _>("course_id")?,
            row.try_get::<Option<Uuid>, _>("module_id")?,
            row.try_get::<Option<Uuid>, _>("lesson_id")?,
        ))
    })()
    .map_err(|e| corrupt("quiz", e))?;
    QuizParent::most_specific(
        ids.0.map(CourseId::from_uuid),
        ids.1.map(ModuleId::from_uuid),
        ids.2.map(LessonId::from_uuid),
    )
    .map_err(|e| corrupt("quiz", e))
}

fn attempt_from_row(row: &PgRow) -> StoreResult<QuizAttempt> {
    let decode = || -> Result<QuizAttempt, sqlx::Error> {
        Ok(QuizAttempt {
            id: AttemptId::from_uuid(row.try_get("id")?),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            quiz_id: QuizId::from_uuid(row.try_get("quiz_id")?),
            score: row.try_get("score")?,
            total_points: row.try_get("total_points")?,
            percentage: row.try_get("percentage")?,
            passed: row.try_get("passed")?,
            created_at: row.try_get("created_at")?,
        })
    };
    decode().map_err(|e| corrupt("quiz attempt", e))
}

fn progress_from_row(row: &PgRow) -> StoreResult<LessonProgress> {
    let decode = || -> Result<LessonProgress, sqlx::Error> {
        Ok(LessonProgress {
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            lesson_id: LessonId::from_uuid(row.try_get("lesson_id")?),
            completed: row.try_get("completed")?,
            completed_at: row.try_get("completed_at")?,
        })
    };
    decode().map_err(|e| corrupt("lesson progress", e))
}

// ─── Ownership guard helpers ─────────────────────────────────────────────────

/// Lock the course row for the rest of the transaction and check `guard`.
async fn guard_course(
    conn: &mut PgConnection,
    course_id: CourseId,
    guard: OwnerGuard,
) -> StoreResult<()> {
    let owner: Option<Uuid> =
        sqlx::query_scalar("SELECT instructor_id FROM courses WHERE id = $1 FOR SHARE")
            .bind(course_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("guard_course", e))?;
    let owner = owner.ok_or_else(|| StoreError::not_found("No course found with that ID"))?;
    guard.check(UserId::from_uuid(owner))
}

async fn course_of_module(conn: &mut PgConnection, id: ModuleId) -> StoreResult<Option<CourseId>> {
    let course: Option<Uuid> = sqlx::query_scalar("SELECT course_id FROM modules WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("course_of_module", e))?;
    Ok(course.map(CourseId::from_uuid))
}

async fn course_of_lesson(conn: &mut PgConnection, id: LessonId) -> StoreResult<Option<CourseId>> {
    let course: Option<Uuid> = sqlx::query_scalar(
        "SELECT m.course_id FROM lessons l JOIN modules m ON m.id = l.module_id WHERE l.id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("course_of_lesson", e))?;
    Ok(course.map(CourseId::from_uuid))
}

async fn course_of_parent(
    conn: &mut PgConnection,
    parent: QuizParent,
) -> StoreResult<Option<CourseId>> {
    match parent {
        QuizParent::Course(id) => Ok(Some(id)),
        QuizParent::Module(id) => course_of_module(conn, id).await,
        QuizParent::Lesson(id) => course_of_lesson(conn, id).await,
    }
}

// ─── Quiz loading ────────────────────────────────────────────────────────────

async fn load_quizzes(conn: &mut PgConnection, rows: Vec<PgRow>) -> StoreResult<Vec<Quiz>> {
    let mut quizzes = Vec::with_capacity(rows.len());
    for row in &rows {
        let decode = || -> Result<(Uuid, String, i32, DateTime<Utc>), sqlx::Error> {
            Ok((
                row.try_get("id")?,
                row.try_get("title")?,
                row.try_get("pass_mark")?,
                row.try_get("created_at")?,
            ))
        };
        let (id, title, pass_mark, created_at) = decode().map_err(|e| corrupt("quiz", e))?;
        quizzes.push(Quiz {
            id: QuizId::from_uuid(id),
            title,
            pass_mark,
            parent: parent_from_row(row)?,
            questions: Vec::new(),
            created_at,
        });
    }
    if quizzes.is_empty() {
        return Ok(quizzes);
    }

    let quiz_ids: Vec<Uuid> = quizzes.iter().map(|q| *q.id.as_uuid()).collect();
    let question_rows = sqlx::query(
        "SELECT id, quiz_id, text, type, points, position FROM questions \
         WHERE quiz_id = ANY($1) ORDER BY position ASC",
    )
    .bind(&quiz_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_questions", e))?;

    let mut questions = Vec::with_capacity(question_rows.len());
    for row in &question_rows {
        let decode = || -> Result<(Question, String), sqlx::Error> {
            Ok((
                Question {
                    id: QuestionId::from_uuid(row.try_get("id")?),
                    quiz_id: QuizId::from_uuid(row.try_get("quiz_id")?),
                    text: row.try_get("text")?,
                    question_type: QuestionType::default(),
                    points: row.try_get("points")?,
                    position: row.try_get("position")?,
                    options: Vec::new(),
                },
                row.try_get("type")?,
            ))
        };
        let (mut question, kind) = decode().map_err(|e| corrupt("question", e))?;
        question.question_type = QuestionType::from_str(&kind).map_err(|e| corrupt("question", e))?;
        questions.push(question);
    }

    let question_ids: Vec<Uuid> = questions.iter().map(|q| *q.id.as_uuid()).collect();
    let option_rows = sqlx::query(
        "SELECT id, question_id, text, is_correct FROM question_options \
         WHERE question_id = ANY($1) ORDER BY position ASC",
    )
    .bind(&question_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_options", e))?;

    let mut options: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
    for row in &option_rows {
        let decode = || -> Result<(Uuid, QuestionOption), sqlx::Error> {
            Ok((
                row.try_get("question_id")?,
                QuestionOption {
                    id: OptionId::from_uuid(row.try_get("id")?),
                    text: row.try_get("text")?,
                    is_correct: row.try_get("is_correct")?,
                },
            ))
        };
        let (question_id, option) = decode().map_err(|e| corrupt("question option", e))?;
        options.entry(question_id).or_default().push(option);
    }

    for mut question in questions {
        question.options = options.remove(question.id.as_uuid()).unwrap_or_default();
        if let Some(quiz) = quizzes.iter_mut().find(|q| q.id == question.quiz_id) {
            quiz.questions.push(question);
        }
    }
    Ok(quizzes)
}

// ─── UserStore ───────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, roll_number, active, \
             created_by, password_changed_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.roll_number)
        .bind(user.active)
        .bind(user.created_by.map(Uuid::from))
        .bind(user.password_changed_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_active_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE active ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_active_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self, password_hash), fields(user_id = %id), err)]
    async fn update_password(
        &self,
        id: UserId,
        password_hash: String,
        changed_at: DateTime<Utc>,
    ) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            "UPDATE users SET password_hash = $2, password_changed_at = $3 WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(&password_hash)
        .bind(changed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_password", e))?
        .ok_or_else(|| StoreError::not_found("No user found with that ID"))?;
        user_from_row(&row)
    }

    async fn set_active(&self, id: UserId, active: bool) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            "UPDATE users SET active = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_active", e))?
        .ok_or_else(|| StoreError::not_found("No user found with that ID"))?;
        user_from_row(&row)
    }
}

// ─── ContentStore ────────────────────────────────────────────────────────────

#[async_trait]
impl ContentStore for PostgresStore {
    #[instrument(skip(self, course), fields(course_id = %course.id), err)]
    async fn insert_course(&self, course: Course) -> StoreResult<Course> {
        sqlx::query(&format!(
            "INSERT INTO courses ({COURSE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(course.id.as_uuid())
        .bind(&course.title)
        .bind(&course.slug)
        .bind(&course.description)
        .bind(course.instructor_id.as_uuid())
        .bind(course.published)
        .bind(course.price)
        .bind(course.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_course", e))?;
        Ok(course)
    }

    async fn find_course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_course", e))?;
        row.as_ref().map(course_from_row).transpose()
    }

    async fn list_published_courses(&self) -> StoreResult<Vec<CourseListing>> {
        let rows = sqlx::query(
            "SELECT c.id, c.title, c.slug, c.description, c.instructor_id, c.published, c.price, \
                    c.created_at, u.name AS instructor_name, u.email AS instructor_email, \
                    (SELECT COUNT(*) FROM modules m WHERE m.course_id = c.id) AS module_count, \
                    (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS enrollment_count \
             FROM courses c JOIN users u ON u.id = c.instructor_id \
             WHERE c.published \
             ORDER BY c.created_at DESC, c.id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_published_courses", e))?;

        rows.iter()
            .map(|row| -> StoreResult<CourseListing> {
                let course = course_from_row(row)?;
                let extra = (|| -> Result<_, sqlx::Error> {
                    Ok((
                        row.try_get::<String, _>("instructor_name")?,
                        row.try_get::<String, _>("instructor_email")?,
                        row.try_get::<i64, _>("module_count")?,
                        row.try_get::<i64, _>("enrollment_count")?,
                    ))
                })()
                .map_err(|e| corrupt("course listing", e))?;
                Ok(CourseListing {
                    instructor: InstructorInfo {
                        id: course.instructor_id,
                        name: extra.0,
                        email: extra.1,
                    },
                    course,
                    module_count: extra.2,
                    enrollment_count: extra.3,
                })
            })
            .collect()
    }

    #[instrument(skip(self, patch), fields(course_id = %id), err)]
    async fn update_course(
        &self,
        id: CourseId,
        guard: OwnerGuard,
        patch: &CoursePatch,
    ) -> StoreResult<Course> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_course", e))?
        .ok_or_else(|| StoreError::not_found("No course found with that ID"))?;
        let mut course = course_from_row(&row)?;
        guard.check(course.instructor_id)?;
        patch.apply(&mut course)?;

        sqlx::query(
            "UPDATE courses SET title = $2, slug = $3, description = $4, published = $5, price = $6 \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&course.title)
        .bind(&course.slug)
        .bind(&course.description)
        .bind(course.published)
        .bind(course.price)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_course", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(course)
    }

    #[instrument(skip(self), fields(course_id = %id), err)]
    async fn delete_course(&self, id: CourseId, guard: OwnerGuard) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT instructor_id FROM courses WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_course", e))?;
        let owner = owner.ok_or_else(|| StoreError::not_found("No course found with that ID"))?;
        guard.check(UserId::from_uuid(owner))?;

        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_course", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn course_owner(&self, id: CourseId) -> StoreResult<Option<UserId>> {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT instructor_id FROM courses WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("course_owner", e))?;
        Ok(owner.map(UserId::from_uuid))
    }

    #[instrument(skip(self, module), fields(module_id = %module.id, course_id = %module.course_id), err)]
    async fn insert_module(
        &self,
        module: CourseModule,
        guard: OwnerGuard,
    ) -> StoreResult<CourseModule> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        guard_course(&mut tx, module.course_id, guard).await?;

        sqlx::query("INSERT INTO modules (id, course_id, title, \"order\") VALUES ($1, $2, $3, $4)")
            .bind(module.id.as_uuid())
            .bind(module.course_id.as_uuid())
            .bind(&module.title)
            .bind(module.order)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_module", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(module)
    }

    async fn find_module(&self, id: ModuleId) -> StoreResult<Option<CourseModule>> {
        let row = sqlx::query("SELECT id, course_id, title, \"order\" FROM modules WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_module", e))?;
        row.as_ref().map(module_from_row).transpose()
    }

    async fn list_modules(&self, course_id: CourseId) -> StoreResult<Vec<CourseModule>> {
        let rows = sqlx::query(
            "SELECT id, course_id, title, \"order\" FROM modules WHERE course_id = $1 \
             ORDER BY \"order\" ASC, id ASC",
        )
        .bind(course_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_modules", e))?;
        rows.iter().map(module_from_row).collect()
    }

    #[instrument(skip(self, patch), fields(module_id = %id), err)]
    async fn update_module(
        &self,
        id: ModuleId,
        guard: OwnerGuard,
        patch: &ModulePatch,
    ) -> StoreResult<CourseModule> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let course_id = course_of_module(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("No module found with that ID"))?;
        guard_course(&mut tx, course_id, guard).await?;

        let row = sqlx::query(
            "SELECT id, course_id, title, \"order\" FROM modules WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_module", e))?;
        let mut module = module_from_row(&row)?;
        patch.apply(&mut module)?;

        sqlx::query("UPDATE modules SET title = $2, \"order\" = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(&module.title)
            .bind(module.order)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_module", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(module)
    }

    #[instrument(skip(self), fields(module_id = %id), err)]
    async fn delete_module(&self, id: ModuleId, guard: OwnerGuard) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let course_id = course_of_module(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("No module found with that ID"))?;
        guard_course(&mut tx, course_id, guard).await?;

        sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_module", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn module_course(&self, id: ModuleId) -> StoreResult<Option<CourseId>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        course_of_module(&mut conn, id).await
    }

    #[instrument(skip(self, lesson), fields(lesson_id = %lesson.id, module_id = %lesson.module_id), err)]
    async fn insert_lesson(&self, lesson: Lesson, guard: OwnerGuard) -> StoreResult<Lesson> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let course_id = course_of_module(&mut tx, lesson.module_id)
            .await?
            .ok_or_else(|| StoreError::not_found("No module found with that ID"))?;
        guard_course(&mut tx, course_id, guard).await?;

        let (kind, video_url, duration, text_content, file_url) = lesson_payload(&lesson.content);
        sqlx::query(&format!(
            "INSERT INTO lessons ({LESSON_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(lesson.id.as_uuid())
        .bind(lesson.module_id.as_uuid())
        .bind(&lesson.title)
        .bind(lesson.order)
        .bind(kind)
        .bind(video_url)
        .bind(duration)
        .bind(text_content)
        .bind(file_url)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_lesson", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(lesson)
    }

    async fn find_lesson(&self, id: LessonId) -> StoreResult<Option<Lesson>> {
        let row = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_lesson", e))?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    async fn list_lessons(&self, module_id: ModuleId) -> StoreResult<Vec<Lesson>> {
        let rows = sqlx::query(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE module_id = $1 ORDER BY \"order\" ASC, id ASC"
        ))
        .bind(module_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_lessons", e))?;
        rows.iter().map(lesson_from_row).collect()
    }

    #[instrument(skip(self, patch), fields(lesson_id = %id), err)]
    async fn update_lesson(
        &self,
        id: LessonId,
        guard: OwnerGuard,
        patch: &LessonPatch,
    ) -> StoreResult<Lesson> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let course_id = course_of_lesson(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("No lesson found with that ID"))?;
        guard_course(&mut tx, course_id, guard).await?;

        let row = sqlx::query(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_lesson", e))?;
        let mut lesson = lesson_from_row(&row)?;
        patch.apply(&mut lesson)?;

        let (kind, video_url, duration, text_content, file_url) = lesson_payload(&lesson.content);
        sqlx::query(
            "UPDATE lessons SET title = $2, \"order\" = $3, type = $4, video_url = $5, \
             duration = $6, text_content = $7, file_url = $8 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&lesson.title)
        .bind(lesson.order)
        .bind(kind)
        .bind(video_url)
        .bind(duration)
        .bind(text_content)
        .bind(file_url)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_lesson", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(lesson)
    }

    #[instrument(skip(self), fields(lesson_id = %id), err)]
    async fn delete_lesson(&self, id: LessonId, guard: OwnerGuard) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let course_id = course_of_lesson(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("No lesson found with that ID"))?;
        guard_course(&mut tx, course_id, guard).await?;

        sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_lesson", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn lesson_module(&self, id: LessonId) -> StoreResult<Option<ModuleId>> {
        let module: Option<Uuid> = sqlx::query_scalar("SELECT module_id FROM lessons WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("lesson_module", e))?;
        Ok(module.map(ModuleId::from_uuid))
    }
}

// ─── EnrollmentStore ─────────────────────────────────────────────────────────

#[async_trait]
impl EnrollmentStore for PostgresStore {
    #[instrument(skip(self, enrollment), fields(user_id = %enrollment.user_id, course_id = %enrollment.course_id), err)]
    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<Enrollment> {
        sqlx::query(
            "INSERT INTO enrollments (user_id, course_id, source, enrolled_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(enrollment.user_id.as_uuid())
        .bind(enrollment.course_id.as_uuid())
        .bind(enrollment.source.as_str())
        .bind(enrollment.enrolled_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("enroll", e))?;
        Ok(enrollment)
    }

    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM enrollments WHERE user_id = $1 AND course_id = $2")
            .bind(user_id.as_uuid())
            .bind(course_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("unenroll", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Enrollment not found"));
        }
        Ok(())
    }

    async fn is_enrolled(&self, user_id: UserId, course_id: CourseId) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id.as_uuid())
        .bind(course_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("is_enrolled", e))
    }

    async fn list_course_students(&self, course_id: CourseId) -> StoreResult<Vec<EnrolledStudent>> {
        let rows = sqlx::query(
            "SELECT e.enrolled_at, u.id, u.name, u.email, u.password_hash, u.role, u.roll_number, \
                    u.active, u.created_by, u.password_changed_at, u.created_at \
             FROM enrollments e JOIN users u ON u.id = e.user_id \
             WHERE e.course_id = $1 ORDER BY e.enrolled_at ASC, u.id ASC",
        )
        .bind(course_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_course_students", e))?;

        rows.iter()
            .map(|row| -> StoreResult<EnrolledStudent> {
                let enrolled_at = row
                    .try_get("enrolled_at")
                    .map_err(|e| corrupt("enrollment", e))?;
                Ok(EnrolledStudent {
                    enrolled_at,
                    user: user_from_row(row)?.profile(),
                })
            })
            .collect()
    }

    async fn list_user_courses(&self, user_id: UserId) -> StoreResult<Vec<EnrolledCourse>> {
        let rows = sqlx::query(
            "SELECT e.enrolled_at, c.id, c.title, c.slug, c.description, c.instructor_id, \
                    c.published, c.price, c.created_at \
             FROM enrollments e JOIN courses c ON c.id = e.course_id \
             WHERE e.user_id = $1 ORDER BY e.enrolled_at ASC, c.id ASC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_user_courses", e))?;

        rows.iter()
            .map(|row| -> StoreResult<EnrolledCourse> {
                let enrolled_at = row
                    .try_get("enrolled_at")
                    .map_err(|e| corrupt("enrollment", e))?;
                Ok(EnrolledCourse {
                    enrolled_at,
                    course: course_from_row(row)?,
                })
            })
            .collect()
    }

    async fn mark_complete(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress> {
        let row = sqlx::query(
            "INSERT INTO lesson_progress (user_id, lesson_id, completed, completed_at) \
             VALUES ($1, $2, TRUE, $3) \
             ON CONFLICT (user_id, lesson_id) DO UPDATE \
             SET completed = TRUE, \
                 completed_at = COALESCE(lesson_progress.completed_at, EXCLUDED.completed_at) \
             RETURNING user_id, lesson_id, completed, completed_at",
        )
        .bind(user_id.as_uuid())
        .bind(lesson_id.as_uuid())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_complete", e))?;
        progress_from_row(&row)
    }

    async fn list_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> StoreResult<Vec<LessonProgress>> {
        let rows = sqlx::query(
            "SELECT p.user_id, p.lesson_id, p.completed, p.completed_at \
             FROM lesson_progress p \
             JOIN lessons l ON l.id = p.lesson_id \
             JOIN modules m ON m.id = l.module_id \
             WHERE p.user_id = $1 AND m.course_id = $2 \
             ORDER BY p.completed_at ASC, p.lesson_id ASC",
        )
        .bind(user_id.as_uuid())
        .bind(course_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_progress", e))?;
        rows.iter().map(progress_from_row).collect()
    }
}

// ─── QuizStore ───────────────────────────────────────────────────────────────

#[async_trait]
impl QuizStore for PostgresStore {
    #[instrument(skip(self, quiz), fields(quiz_id = %quiz.id), err)]
    async fn insert_quiz(&self, quiz: Quiz, guard: OwnerGuard) -> StoreResult<Quiz> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let course_id = course_of_parent(&mut tx, quiz.parent)
            .await?
            .ok_or_else(|| StoreError::not_found("The quiz parent does not exist"))?;
        guard_course(&mut tx, course_id, guard).await?;

        let (course, module, lesson) = parent_columns(quiz.parent);
        sqlx::query(
            "INSERT INTO quizzes (id, title, pass_mark, course_id, module_id, lesson_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(quiz.id.as_uuid())
        .bind(&quiz.title)
        .bind(quiz.pass_mark)
        .bind(course)
        .bind(module)
        .bind(lesson)
        .bind(quiz.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_quiz", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(quiz)
    }

    async fn find_quiz(&self, id: QuizId) -> StoreResult<Option<Quiz>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        let rows = sqlx::query(
            "SELECT id, title, pass_mark, course_id, module_id, lesson_id, created_at \
             FROM quizzes WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("find_quiz", e))?;
        Ok(load_quizzes(&mut conn, rows).await?.into_iter().next())
    }

    async fn list_quizzes(&self, parent: QuizParent) -> StoreResult<Vec<Quiz>> {
        let column = match parent {
            QuizParent::Course(_) => "course_id",
            QuizParent::Module(_) => "module_id",
            QuizParent::Lesson(_) => "lesson_id",
        };
        let (course, module, lesson) = parent_columns(parent);
        let parent_id = course.or(module).or(lesson);

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        let rows = sqlx::query(&format!(
            "SELECT id, title, pass_mark, course_id, module_id, lesson_id, created_at \
             FROM quizzes WHERE {column} = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_quizzes", e))?;
        load_quizzes(&mut conn, rows).await
    }

    #[instrument(skip(self, question, guard), fields(quiz_id = %quiz_id), err)]
    async fn add_question(
        &self,
        quiz_id: QuizId,
        question: NewQuestion,
        guard: OwnerGuard,
    ) -> StoreResult<Question> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            "SELECT id, title, pass_mark, course_id, module_id, lesson_id, created_at \
             FROM quizzes WHERE id = $1 FOR UPDATE",
        )
        .bind(quiz_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("add_question", e))?
        .ok_or_else(|| StoreError::not_found("No quiz found with that ID"))?;
        let parent = parent_from_row(&row)?;
        let course_id = course_of_parent(&mut tx, parent)
            .await?
            .ok_or_else(|| StoreError::not_found("The quiz parent does not exist"))?;
        guard_course(&mut tx, course_id, guard).await?;

        let position: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
            .bind(quiz_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_question", e))?;
        let question = question.into_question(quiz_id, position as i32);

        sqlx::query(
            "INSERT INTO questions (id, quiz_id, text, type, points, position) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(question.id.as_uuid())
        .bind(quiz_id.as_uuid())
        .bind(&question.text)
        .bind(question.question_type.as_str())
        .bind(question.points)
        .bind(question.position)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("add_question", e))?;

        for (idx, option) in question.options.iter().enumerate() {
            sqlx::query(
                "INSERT INTO question_options (id, question_id, text, is_correct, position) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(option.id.as_uuid())
            .bind(question.id.as_uuid())
            .bind(&option.text)
            .bind(option.is_correct)
            .bind(idx as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_question_option", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(question)
    }

    async fn quiz_parent(&self, id: QuizId) -> StoreResult<Option<QuizParent>> {
        let row = sqlx::query("SELECT course_id, module_id, lesson_id FROM quizzes WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("quiz_parent", e))?;
        row.as_ref().map(parent_from_row).transpose()
    }

    #[instrument(skip(self, attempt), fields(quiz_id = %attempt.quiz_id, user_id = %attempt.user_id), err)]
    async fn record_attempt(&self, attempt: QuizAttempt) -> StoreResult<QuizAttempt> {
        sqlx::query(
            "INSERT INTO quiz_attempts (id, user_id, quiz_id, score, total_points, percentage, \
             passed, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(attempt.id.as_uuid())
        .bind(attempt.user_id.as_uuid())
        .bind(attempt.quiz_id.as_uuid())
        .bind(attempt.score)
        .bind(attempt.total_points)
        .bind(attempt.percentage)
        .bind(attempt.passed)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_attempt", e))?;
        Ok(attempt)
    }

    async fn list_attempts(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> StoreResult<Vec<QuizAttempt>> {
        let rows = sqlx::query(
            "SELECT id, user_id, quiz_id, score, total_points, percentage, passed, created_at \
             FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id.as_uuid())
        .bind(quiz_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_attempts", e))?;
        rows.iter().map(attempt_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_constraints_map_to_readable_conflicts() {
        assert_eq!(
            conflict_message(Some("enrollments_pkey")),
            "You are already enrolled in this course"
        );
        assert_eq!(
            conflict_message(Some("users_email_key")),
            "A user with that email already exists"
        );
        assert_eq!(conflict_message(None), "Duplicate field value");
    }

    #[test]
    fn lesson_payload_keeps_only_matching_columns() {
        let video = LessonContent::Video {
            video_url: "https://v".into(),
            duration: Some(90),
        };
        assert_eq!(lesson_payload(&video), ("VIDEO", Some("https://v"), Some(90), None, None));
        let text = LessonContent::Text {
            text_content: "body".into(),
        };
        assert_eq!(lesson_payload(&text), ("TEXT", None, None, Some("body"), None));
    }

    #[test]
    fn parent_columns_set_exactly_one() {
        let id = ModuleId::new();
        let (c, m, l) = parent_columns(QuizParent::Module(id));
        assert!(c.is_none() && l.is_none());
        assert_eq!(m, Some(*id.as_uuid()));
    }

    #[test]
    fn schema_declares_named_unique_constraints() {
        for name in [
            "users_email_key",
            "courses_slug_key",
            "modules_course_order_key",
            "enrollments_pkey",
        ] {
            assert!(SCHEMA.contains(name), "missing constraint {name}");
        }
    }
}

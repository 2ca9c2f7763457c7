use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lms_auth::User;
use lms_core::{CourseId, LessonId, ModuleId, QuizId, UserId};
use lms_courses::{Course, CourseModule, CoursePatch, Lesson, LessonPatch, ModulePatch};
use lms_enrollment::{Enrollment, LessonProgress};
use lms_quizzes::{NewQuestion, Question, Quiz, QuizAttempt, QuizParent};

use crate::StoreError;
use crate::store::{
    ContentStore, CourseListing, EnrolledCourse, EnrolledStudent, EnrollmentStore, InstructorInfo,
    OwnerGuard, QuizStore, StoreResult, UserStore,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    courses: HashMap<CourseId, Course>,
    modules: HashMap<ModuleId, CourseModule>,
    lessons: HashMap<LessonId, Lesson>,
    enrollments: HashMap<(UserId, CourseId), Enrollment>,
    progress: HashMap<(UserId, LessonId), LessonProgress>,
    quizzes: HashMap<QuizId, Quiz>,
    attempts: Vec<QuizAttempt>,
}

impl Tables {
    fn course_of_module(&self, id: ModuleId) -> Option<CourseId> {
        self.modules.get(&id).map(|m| m.course_id)
    }

    fn course_of_lesson(&self, id: LessonId) -> Option<CourseId> {
        self.lessons
            .get(&id)
            .and_then(|l| self.course_of_module(l.module_id))
    }

    fn course_of_parent(&self, parent: QuizParent) -> Option<CourseId> {
        match parent {
            QuizParent::Course(id) => self.courses.contains_key(&id).then_some(id),
            QuizParent::Module(id) => self.course_of_module(id),
            QuizParent::Lesson(id) => self.course_of_lesson(id),
        }
    }

    fn guard_course(&self, course_id: CourseId, guard: OwnerGuard) -> StoreResult<()> {
        let course = self
            .courses
            .get(&course_id)
            .ok_or_else(|| StoreError::not_found("No course found with that ID"))?;
        guard.check(course.instructor_id)
    }

    fn remove_lessons(&mut self, ids: &[LessonId]) {
        for id in ids {
            self.lessons.remove(id);
            self.quizzes
                .retain(|_, q| q.parent != QuizParent::Lesson(*id));
        }
        self.progress.retain(|(_, lesson), _| !ids.contains(lesson));
    }

    fn remove_module(&mut self, id: ModuleId) {
        self.modules.remove(&id);
        let lessons: Vec<LessonId> = self
            .lessons
            .values()
            .filter(|l| l.module_id == id)
            .map(|l| l.id)
            .collect();
        self.remove_lessons(&lessons);
        self.quizzes.retain(|_, q| q.parent != QuizParent::Module(id));
    }

    fn prune_attempts(&mut self) {
        let quizzes = &self.quizzes;
        self.attempts.retain(|a| quizzes.contains_key(&a.quiz_id));
    }
}

/// In-memory implementation of every store contract.
///
/// One lock guards all tables, so a guard check and the write it protects
/// always observe the same state. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut t = self.write()?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::conflict("A user with that email already exists"));
        }
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_active_users(&self) -> StoreResult<Vec<User>> {
        let t = self.read()?;
        let mut users: Vec<User> = t.users.values().filter(|u| u.active).cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: String,
        changed_at: DateTime<Utc>,
    ) -> StoreResult<User> {
        let mut t = self.write()?;
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("No user found with that ID"))?;
        user.password_hash = password_hash;
        user.password_changed_at = Some(changed_at);
        Ok(user.clone())
    }

    async fn set_active(&self, id: UserId, active: bool) -> StoreResult<User> {
        let mut t = self.write()?;
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("No user found with that ID"))?;
        user.active = active;
        Ok(user.clone())
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn insert_course(&self, course: Course) -> StoreResult<Course> {
        let mut t = self.write()?;
        if t.courses.values().any(|c| c.slug == course.slug) {
            return Err(StoreError::conflict("A course with that title already exists"));
        }
        t.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn find_course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        Ok(self.read()?.courses.get(&id).cloned())
    }

    async fn list_published_courses(&self) -> StoreResult<Vec<CourseListing>> {
        let t = self.read()?;
        let mut listings: Vec<CourseListing> = t
            .courses
            .values()
            .filter(|c| c.published)
            .filter_map(|c| {
                let instructor = t.users.get(&c.instructor_id)?;
                Some(CourseListing {
                    course: c.clone(),
                    instructor: InstructorInfo {
                        id: instructor.id,
                        name: instructor.name.clone(),
                        email: instructor.email.clone(),
                    },
                    module_count: t.modules.values().filter(|m| m.course_id == c.id).count() as i64,
                    enrollment_count: t
                        .enrollments
                        .keys()
                        .filter(|(_, course)| *course == c.id)
                        .count() as i64,
                })
            })
            .collect();
        listings.sort_by(|a, b| {
            b.course
                .created_at
                .cmp(&a.course.created_at)
                .then(a.course.id.cmp(&b.course.id))
        });
        Ok(listings)
    }

    async fn update_course(
        &self,
        id: CourseId,
        guard: OwnerGuard,
        patch: &CoursePatch,
    ) -> StoreResult<Course> {
        let mut t = self.write()?;
        t.guard_course(id, guard)?;

        let mut updated = t
            .courses
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("No course found with that ID"))?;
        patch.apply(&mut updated)?;
        if t.courses.values().any(|c| c.id != id && c.slug == updated.slug) {
            return Err(StoreError::conflict("A course with that title already exists"));
        }
        t.courses.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_course(&self, id: CourseId, guard: OwnerGuard) -> StoreResult<()> {
        let mut t = self.write()?;
        t.guard_course(id, guard)?;

        t.courses.remove(&id);
        let modules: Vec<ModuleId> = t
            .modules
            .values()
            .filter(|m| m.course_id == id)
            .map(|m| m.id)
            .collect();
        for module in modules {
            t.remove_module(module);
        }
        t.quizzes.retain(|_, q| q.parent != QuizParent::Course(id));
        t.enrollments.retain(|(_, course), _| *course != id);
        t.prune_attempts();
        Ok(())
    }

    async fn course_owner(&self, id: CourseId) -> StoreResult<Option<UserId>> {
        Ok(self.read()?.courses.get(&id).map(|c| c.instructor_id))
    }

    async fn insert_module(
        &self,
        module: CourseModule,
        guard: OwnerGuard,
    ) -> StoreResult<CourseModule> {
        let mut t = self.write()?;
        t.guard_course(module.course_id, guard)?;
        if t
            .modules
            .values()
            .any(|m| m.course_id == module.course_id && m.order == module.order)
        {
            return Err(StoreError::conflict(
                "A module with that order already exists in this course",
            ));
        }
        t.modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn find_module(&self, id: ModuleId) -> StoreResult<Option<CourseModule>> {
        Ok(self.read()?.modules.get(&id).cloned())
    }

    async fn list_modules(&self, course_id: CourseId) -> StoreResult<Vec<CourseModule>> {
        let t = self.read()?;
        let mut modules: Vec<CourseModule> = t
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| (m.order, m.id));
        Ok(modules)
    }

    async fn update_module(
        &self,
        id: ModuleId,
        guard: OwnerGuard,
        patch: &ModulePatch,
    ) -> StoreResult<CourseModule> {
        let mut t = self.write()?;
        let course_id = t
            .course_of_module(id)
            .ok_or_else(|| StoreError::not_found("No module found with that ID"))?;
        t.guard_course(course_id, guard)?;

        let mut updated = t
            .modules
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("No module found with that ID"))?;
        patch.apply(&mut updated)?;
        if t
            .modules
            .values()
            .any(|m| m.id != id && m.course_id == course_id && m.order == updated.order)
        {
            return Err(StoreError::conflict(
                "A module with that order already exists in this course",
            ));
        }
        t.modules.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_module(&self, id: ModuleId, guard: OwnerGuard) -> StoreResult<()> {
        let mut t = self.write()?;
        let course_id = t
            .course_of_module(id)
            .ok_or_else(|| StoreError::not_found("No module found with that ID"))?;
        t.guard_course(course_id, guard)?;
        t.remove_module(id);
        t.prune_attempts();
        Ok(())
    }

    async fn module_course(&self, id: ModuleId) -> StoreResult<Option<CourseId>> {
        Ok(self.read()?.course_of_module(id))
    }

    async fn insert_lesson(&self, lesson: Lesson, guard: OwnerGuard) -> StoreResult<Lesson> {
        let mut t = self.write()?;
        let course_id = t
            .course_of_module(lesson.module_id)
            .ok_or_else(|| StoreError::not_found("No module found with that ID"))?;
        t.guard_course(course_id, guard)?;
        t.lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    async fn find_lesson(&self, id: LessonId) -> StoreResult<Option<Lesson>> {
        Ok(self.read()?.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, module_id: ModuleId) -> StoreResult<Vec<Lesson>> {
        let t = self.read()?;
        let mut lessons: Vec<Lesson> = t
            .lessons
            .values()
            .filter(|l| l.module_id == module_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order, l.id));
        Ok(lessons)
    }

    async fn update_lesson(
        &self,
        id: LessonId,
        guard: OwnerGuard,
        patch: &LessonPatch,
    ) -> StoreResult<Lesson> {
        let mut t = self.write()?;
        let course_id = t
            .course_of_lesson(id)
            .ok_or_else(|| StoreError::not_found("No lesson found with that ID"))?;
        t.guard_course(course_id, guard)?;

        let lesson = t
            .lessons
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("No lesson found with that ID"))?;
        let mut updated = lesson.clone();
        patch.apply(&mut updated)?;
        *lesson = updated.clone();
        Ok(updated)
    }

    async fn delete_lesson(&self, id: LessonId, guard: OwnerGuard) -> StoreResult<()> {
        let mut t = self.write()?;
        let course_id = t
            .course_of_lesson(id)
            .ok_or_else(|| StoreError::not_found("No lesson found with that ID"))?;
        t.guard_course(course_id, guard)?;
        t.remove_lessons(&[id]);
        t.prune_attempts();
        Ok(())
    }

    async fn lesson_module(&self, id: LessonId) -> StoreResult<Option<ModuleId>> {
        Ok(self.read()?.lessons.get(&id).map(|l| l.module_id))
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<Enrollment> {
        let mut t = self.write()?;
        if !t.courses.contains_key(&enrollment.course_id) {
            return Err(StoreError::not_found("No course found with that ID"));
        }
        if !t.users.contains_key(&enrollment.user_id) {
            return Err(StoreError::not_found("No user found with that ID"));
        }
        if t.enrollments.contains_key(&enrollment.key()) {
            return Err(StoreError::conflict("You are already enrolled in this course"));
        }
        t.enrollments.insert(enrollment.key(), enrollment.clone());
        Ok(enrollment)
    }

    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> StoreResult<()> {
        let mut t = self.write()?;
        t.enrollments
            .remove(&(user_id, course_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("Enrollment not found"))
    }

    async fn is_enrolled(&self, user_id: UserId, course_id: CourseId) -> StoreResult<bool> {
        Ok(self.read()?.enrollments.contains_key(&(user_id, course_id)))
    }

    async fn list_course_students(&self, course_id: CourseId) -> StoreResult<Vec<EnrolledStudent>> {
        let t = self.read()?;
        let mut students: Vec<EnrolledStudent> = t
            .enrollments
            .values()
            .filter(|e| e.course_id == course_id)
            .filter_map(|e| {
                t.users.get(&e.user_id).map(|u| EnrolledStudent {
                    enrolled_at: e.enrolled_at,
                    user: u.profile(),
                })
            })
            .collect();
        students.sort_by_key(|s| (s.enrolled_at, s.user.id));
        Ok(students)
    }

    async fn list_user_courses(&self, user_id: UserId) -> StoreResult<Vec<EnrolledCourse>> {
        let t = self.read()?;
        let mut courses: Vec<EnrolledCourse> = t
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| {
                t.courses.get(&e.course_id).map(|c| EnrolledCourse {
                    enrolled_at: e.enrolled_at,
                    course: c.clone(),
                })
            })
            .collect();
        courses.sort_by_key(|c| (c.enrolled_at, c.course.id));
        Ok(courses)
    }

    async fn mark_complete(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress> {
        let mut t = self.write()?;
        if !t.lessons.contains_key(&lesson_id) {
            return Err(StoreError::not_found("No lesson found with that ID"));
        }
        let entry = match t.progress.remove(&(user_id, lesson_id)) {
            Some(existing) => existing.merge_completion(now),
            None => LessonProgress::completed(user_id, lesson_id, now),
        };
        t.progress.insert((user_id, lesson_id), entry.clone());
        Ok(entry)
    }

    async fn list_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> StoreResult<Vec<LessonProgress>> {
        let t = self.read()?;
        let mut entries: Vec<LessonProgress> = t
            .progress
            .values()
            .filter(|p| p.user_id == user_id && t.course_of_lesson(p.lesson_id) == Some(course_id))
            .cloned()
            .collect();
        entries.sort_by_key(|p| (p.completed_at, p.lesson_id));
        Ok(entries)
    }
}

#[async_trait]
impl QuizStore for InMemoryStore {
    async fn insert_quiz(&self, quiz: Quiz, guard: OwnerGuard) -> StoreResult<Quiz> {
        let mut t = self.write()?;
        let course_id = t
            .course_of_parent(quiz.parent)
            .ok_or_else(|| StoreError::not_found("The quiz parent does not exist"))?;
        t.guard_course(course_id, guard)?;
        t.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn find_quiz(&self, id: QuizId) -> StoreResult<Option<Quiz>> {
        Ok(self.read()?.quizzes.get(&id).cloned())
    }

    async fn list_quizzes(&self, parent: QuizParent) -> StoreResult<Vec<Quiz>> {
        let t = self.read()?;
        let mut quizzes: Vec<Quiz> = t
            .quizzes
            .values()
            .filter(|q| q.parent == parent)
            .cloned()
            .collect();
        quizzes.sort_by_key(|q| (q.created_at, q.id));
        Ok(quizzes)
    }

    async fn add_question(
        &self,
        quiz_id: QuizId,
        question: NewQuestion,
        guard: OwnerGuard,
    ) -> StoreResult<Question> {
        let mut t = self.write()?;
        let parent = t
            .quizzes
            .get(&quiz_id)
            .map(|q| q.parent)
            .ok_or_else(|| StoreError::not_found("No quiz found with that ID"))?;
        let course_id = t
            .course_of_parent(parent)
            .ok_or_else(|| StoreError::not_found("The quiz parent does not exist"))?;
        t.guard_course(course_id, guard)?;

        let quiz = t
            .quizzes
            .get_mut(&quiz_id)
            .ok_or_else(|| StoreError::not_found("No quiz found with that ID"))?;
        let question = question.into_question(quiz_id, quiz.questions.len() as i32);
        quiz.questions.push(question.clone());
        Ok(question)
    }

    async fn quiz_parent(&self, id: QuizId) -> StoreResult<Option<QuizParent>> {
        Ok(self.read()?.quizzes.get(&id).map(|q| q.parent))
    }

    async fn record_attempt(&self, attempt: QuizAttempt) -> StoreResult<QuizAttempt> {
        let mut t = self.write()?;
        if !t.quizzes.contains_key(&attempt.quiz_id) {
            return Err(StoreError::not_found("No quiz found with that ID"));
        }
        t.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn list_attempts(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> StoreResult<Vec<QuizAttempt>> {
        let t = self.read()?;
        let mut attempts: Vec<QuizAttempt> = t
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use lms_auth::{NewUser, Role};
    use lms_courses::{LessonContent, NewCourse, NewModule};
    use lms_enrollment::EnrollmentSource;
    use lms_quizzes::{NewOption, NewQuiz};

    use super::*;

    async fn seed_user(store: &InMemoryStore, email: &str, role: Role) -> User {
        let user = NewUser::parse("Someone", email, "password123", role, None)
            .unwrap()
            .into_user("hash".into(), None, Utc::now());
        store.insert_user(user).await.unwrap()
    }

    async fn seed_course(store: &InMemoryStore, owner: UserId, title: &str) -> Course {
        let course = NewCourse::parse(title, None, Some(true), None)
            .unwrap()
            .into_course(owner, Utc::now());
        store.insert_course(course).await.unwrap()
    }

    fn lesson(module_id: ModuleId, order: i32) -> Lesson {
        Lesson {
            id: LessonId::new(),
            module_id,
            title: format!("Lesson {order}"),
            order,
            content: LessonContent::Text {
                text_content: "body".into(),
            },
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = InMemoryStore::new();
        seed_user(&store, "a@lms.io", Role::Student).await;
        let dup = NewUser::parse("Other", "A@lms.io", "password123", Role::Student, None)
            .unwrap()
            .into_user("hash".into(), None, Utc::now());
        assert!(matches!(store.insert_user(dup).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn enrolling_twice_is_a_conflict_and_keeps_one_row() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "i@lms.io", Role::Instructor).await;
        let student = seed_user(&store, "s@lms.io", Role::Student).await;
        let course = seed_course(&store, owner.id, "Rust").await;

        let e = Enrollment::new(student.id, course.id, EnrollmentSource::SelfService, Utc::now());
        store.enroll(e.clone()).await.unwrap();
        assert!(matches!(store.enroll(e).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.list_course_students(course.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enrolling_an_unknown_user_is_not_found() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "i@lms.io", Role::Instructor).await;
        let course = seed_course(&store, owner.id, "Rust").await;

        let e = Enrollment::new(UserId::new(), course.id, EnrollmentSource::Checkout, Utc::now());
        assert!(matches!(store.enroll(e).await, Err(StoreError::NotFound(_))));
        assert!(store.list_course_students(course.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unenroll_missing_is_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.unenroll(UserId::new(), CourseId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn guard_is_rechecked_at_write_time() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "i@lms.io", Role::Instructor).await;
        let course = seed_course(&store, owner.id, "Rust").await;
        let stranger = OwnerGuard::Instructor(UserId::new());

        let patch = CoursePatch {
            title: Some("Hijacked".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_course(course.id, stranger, &patch).await,
            Err(StoreError::OwnershipChanged(_))
        ));
        let module = NewModule::parse("Intro", 1).unwrap().into_module(course.id);
        assert!(matches!(
            store.insert_module(module, stranger).await,
            Err(StoreError::OwnershipChanged(_))
        ));
        assert_eq!(store.find_course(course.id).await.unwrap().unwrap().title, "Rust");
    }

    #[tokio::test]
    async fn course_update_rederives_slug() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "i@lms.io", Role::Instructor).await;
        let course = seed_course(&store, owner.id, "Rust Basics").await;
        let patch = CoursePatch {
            title: Some("Advanced Rust".into()),
            ..Default::default()
        };
        let updated = store
            .update_course(course.id, OwnerGuard::Instructor(owner.id), &patch)
            .await
            .unwrap();
        assert_eq!(updated.slug, "advanced-rust");
    }

    #[tokio::test]
    async fn module_order_is_unique_per_course() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "i@lms.io", Role::Instructor).await;
        let course = seed_course(&store, owner.id, "Rust").await;
        let first = NewModule::parse("One", 1).unwrap().into_module(course.id);
        let clash = NewModule::parse("Two", 1).unwrap().into_module(course.id);
        store.insert_module(first, OwnerGuard::Any).await.unwrap();
        assert!(matches!(
            store.insert_module(clash, OwnerGuard::Any).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_course_cascades() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "i@lms.io", Role::Instructor).await;
        let student = seed_user(&store, "s@lms.io", Role::Student).await;
        let course = seed_course(&store, owner.id, "Rust").await;
        let module = store
            .insert_module(NewModule::parse("One", 1).unwrap().into_module(course.id), OwnerGuard::Any)
            .await
            .unwrap();
        let l = store.insert_lesson(lesson(module.id, 1), OwnerGuard::Any).await.unwrap();
        let quiz = NewQuiz::parse("Check", None, QuizParent::Lesson(l.id))
            .unwrap()
            .into_quiz(Utc::now());
        let quiz = store.insert_quiz(quiz, OwnerGuard::Any).await.unwrap();
        store
            .enroll(Enrollment::new(student.id, course.id, EnrollmentSource::Managed, Utc::now()))
            .await
            .unwrap();

        store.delete_course(course.id, OwnerGuard::Instructor(owner.id)).await.unwrap();

        assert!(store.find_module(module.id).await.unwrap().is_none());
        assert!(store.find_lesson(l.id).await.unwrap().is_none());
        assert!(store.find_quiz(quiz.id).await.unwrap().is_none());
        assert!(!store.is_enrolled(student.id, course.id).await.unwrap());
    }

    #[tokio::test]
    async fn marking_complete_twice_keeps_first_time() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "i@lms.io", Role::Instructor).await;
        let course = seed_course(&store, owner.id, "Rust").await;
        let module = store
            .insert_module(NewModule::parse("One", 1).unwrap().into_module(course.id), OwnerGuard::Any)
            .await
            .unwrap();
        let l = store.insert_lesson(lesson(module.id, 1), OwnerGuard::Any).await.unwrap();
        let user = UserId::new();

        let first = store.mark_complete(user, l.id, Utc::now()).await.unwrap();
        let second = store
            .mark_complete(user, l.id, Utc::now() + chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(first.completed_at, second.completed_at);
        assert_eq!(store.list_progress(user, course.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn questions_append_in_order() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "i@lms.io", Role::Instructor).await;
        let course = seed_course(&store, owner.id, "Rust").await;
        let quiz = NewQuiz::parse("Check", None, QuizParent::Course(course.id))
            .unwrap()
            .into_quiz(Utc::now());
        let quiz = store.insert_quiz(quiz, OwnerGuard::Instructor(owner.id)).await.unwrap();

        for text in ["first", "second"] {
            let q = NewQuestion::parse(
                text,
                None,
                None,
                vec![
                    NewOption { text: "a".into(), is_correct: true },
                    NewOption { text: "b".into(), is_correct: false },
                ],
            )
            .unwrap();
            store.add_question(quiz.id, q, OwnerGuard::Instructor(owner.id)).await.unwrap();
        }

        let stored = store.find_quiz(quiz.id).await.unwrap().unwrap();
        let texts: Vec<&str> = stored.questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
        assert_eq!(stored.questions[1].position, 1);
    }
}

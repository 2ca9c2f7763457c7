//! Ownership-chain resolution.
//!
//! Walks from a leaf resource up to the course at the root of its chain,
//! reading only the parent link at each hop, and reports that course and
//! its owning instructor.

use std::sync::Arc;

use lms_auth::OwnershipChain;
use lms_core::{CourseId, LessonId, ModuleId, QuizId};
use lms_quizzes::QuizParent;

use crate::StoreError;
use crate::store::{ContentStore, QuizStore, StoreResult};

/// A node of the content hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Course(CourseId),
    Module(ModuleId),
    Lesson(LessonId),
    Quiz(QuizId),
}

impl From<QuizParent> for Resource {
    fn from(parent: QuizParent) -> Self {
        match parent {
            QuizParent::Course(id) => Resource::Course(id),
            QuizParent::Module(id) => Resource::Module(id),
            QuizParent::Lesson(id) => Resource::Lesson(id),
        }
    }
}

impl Resource {
    fn missing(&self) -> StoreError {
        let what = match self {
            Resource::Course(_) => "course",
            Resource::Module(_) => "module",
            Resource::Lesson(_) => "lesson",
            Resource::Quiz(_) => "quiz",
        };
        StoreError::not_found(format!("No {what} found with that ID"))
    }
}

#[derive(Clone)]
pub struct OwnershipResolver {
    content: Arc<dyn ContentStore>,
    quizzes: Arc<dyn QuizStore>,
}

impl OwnershipResolver {
    pub fn new(content: Arc<dyn ContentStore>, quizzes: Arc<dyn QuizStore>) -> Self {
        Self { content, quizzes }
    }

    /// Resolve `resource` to its root course and owner.
    ///
    /// Fails with `NotFound` naming the first hop that does not exist.
    pub async fn resolve(&self, resource: Resource) -> StoreResult<OwnershipChain> {
        let mut cursor = resource;
        loop {
            cursor = match cursor {
                Resource::Quiz(id) => self
                    .quizzes
                    .quiz_parent(id)
                    .await?
                    .map(Resource::from)
                    .ok_or_else(|| cursor.missing())?,
                Resource::Lesson(id) => self
                    .content
                    .lesson_module(id)
                    .await?
                    .map(Resource::Module)
                    .ok_or_else(|| cursor.missing())?,
                Resource::Module(id) => self
                    .content
                    .module_course(id)
                    .await?
                    .map(Resource::Course)
                    .ok_or_else(|| cursor.missing())?,
                Resource::Course(id) => {
                    let instructor_id = self
                        .content
                        .course_owner(id)
                        .await?
                        .ok_or_else(|| cursor.missing())?;
                    return Ok(OwnershipChain {
                        course_id: id,
                        instructor_id,
                    });
                }
            };
        }
    }
}

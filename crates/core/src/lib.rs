//! `lms-core` — shared domain building blocks.
//!
//! Typed identifiers, the domain error model and small pure helpers that every
//! other crate in the workspace depends on. No IO lives here.

pub mod error;
pub mod id;
pub mod slug;

pub use error::{DomainError, DomainResult};
pub use id::{
    AttemptId, CourseId, LessonId, ModuleId, OptionId, QuestionId, QuizId, UserId,
};
pub use slug::slugify;

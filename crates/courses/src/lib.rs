//! `lms-courses` — the content hierarchy: courses, modules and lessons.

pub mod course;
pub mod lesson;
pub mod module;

pub use course::{Course, CoursePatch, NewCourse};
pub use lesson::{
    AccessLevel, Lesson, LessonContent, LessonDraft, LessonFull, LessonPatch, LessonSummary,
    LessonType, LessonView, RestrictedLesson,
};
pub use module::{CourseModule, ModulePatch, NewModule};

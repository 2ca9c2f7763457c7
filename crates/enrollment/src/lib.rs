//! `lms-enrollment` — who is enrolled where, and lesson completion.

pub mod enrollment;
pub mod progress;

pub use enrollment::{Enrollment, EnrollmentSource};
pub use progress::LessonProgress;

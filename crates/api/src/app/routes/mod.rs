use axum::Router;

pub mod bookings;
pub mod courses;
pub mod enrollments;
pub mod lessons;
pub mod modules;
pub mod quizzes;
pub mod system;
pub mod users;

/// Every route except `/health`. Each area builds its full paths; the
/// parameter names (`:course_id`, `:module_id`, ...) agree across areas.
pub fn router() -> Router {
    Router::new()
        .merge(users::router())
        .merge(courses::router())
        .merge(modules::router())
        .merge(lessons::router())
        .merge(enrollments::router())
        .merge(quizzes::router())
        .merge(bookings::router())
}

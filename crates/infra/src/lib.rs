//! Infrastructure layer: persistence and ownership resolution.
//!
//! Stores are handed around as `Arc<dyn …Store>` handles; the in-memory
//! implementation backs dev and tests, the Postgres one backs production.

pub mod error;
pub mod in_memory;
pub mod ownership;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use in_memory::InMemoryStore;
pub use ownership::{OwnershipResolver, Resource};
pub use postgres::PostgresStore;
pub use store::{
    ContentStore, CourseListing, EnrolledCourse, EnrolledStudent, EnrollmentStore, InstructorInfo,
    OwnerGuard, QuizStore, StoreResult, UserStore,
};

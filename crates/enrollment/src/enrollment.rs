use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_core::{CourseId, DomainError, UserId};

/// How an enrollment came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentSource {
    /// The student enrolled themselves.
    SelfService,
    /// An admin or the owning instructor enrolled the student.
    Managed,
    /// Created by a verified payment-completed callback.
    Checkout,
}

impl EnrollmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentSource::SelfService => "self_service",
            EnrollmentSource::Managed => "managed",
            EnrollmentSource::Checkout => "checkout",
        }
    }
}

impl FromStr for EnrollmentSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self_service" => Ok(EnrollmentSource::SelfService),
            "managed" => Ok(EnrollmentSource::Managed),
            "checkout" => Ok(EnrollmentSource::Checkout),
            other => Err(DomainError::validation(format!("unknown enrollment source '{other}'"))),
        }
    }
}

/// Link between a user and a course. Identity is the `(user_id, course_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub source: EnrollmentSource,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(user_id: UserId, course_id: CourseId, source: EnrollmentSource, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            course_id,
            source,
            enrolled_at: now,
        }
    }

    pub fn key(&self) -> (UserId, CourseId) {
        (self.user_id, self.course_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_text() {
        for source in [
            EnrollmentSource::SelfService,
            EnrollmentSource::Managed,
            EnrollmentSource::Checkout,
        ] {
            assert_eq!(source.as_str().parse::<EnrollmentSource>().unwrap(), source);
        }
        assert!("gift".parse::<EnrollmentSource>().is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let e = Enrollment::new(UserId::new(), CourseId::new(), EnrollmentSource::Checkout, Utc::now());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["source"], "checkout");
        assert!(json.get("courseId").is_some());
    }
}

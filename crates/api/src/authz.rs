//! API-side authorization guard.
//!
//! Resolves the facts a decision needs (ownership chain, enrollment), asks
//! `lms_auth` for the decision, and turns the answer into either an access
//! level for reads or an [`OwnerGuard`] for the store write that follows.
//! Existence is checked before permission, so a missing resource is a 404
//! even for callers who could not have touched it.

use lms_auth::{
    AccessFacts, Action, Decision, OwnershipChain, Principal, Role, authorize_mutation, decide,
    decide_anonymous_read,
};
use lms_courses::{AccessLevel, Course};
use lms_infra::{OwnerGuard, Resource};

use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;

pub async fn resolve(services: &AppServices, resource: Resource) -> ApiResult<OwnershipChain> {
    Ok(services.resolver.resolve(resource).await?)
}

/// Access level for reading inside `chain`. `None` is an anonymous reader.
pub async fn read_access(
    services: &AppServices,
    viewer: Option<&Principal>,
    chain: &OwnershipChain,
) -> ApiResult<AccessLevel> {
    let decision = match viewer {
        None => decide_anonymous_read(),
        Some(p) => {
            let enrolled = match p.role {
                Role::Admin => false,
                _ if p.id == chain.instructor_id => false,
                _ => services.enrollments.is_enrolled(p.id, chain.course_id).await?,
            };
            decide(p, Action::Read, &AccessFacts::for_chain(chain, enrolled))
        }
    };

    match decision {
        Decision::Allow => Ok(AccessLevel::Full),
        Decision::AllowRestricted => Ok(AccessLevel::Restricted),
        Decision::Deny => Err(ApiError::forbidden("You do not have access to this resource")),
    }
}

/// Full access or 403.
pub async fn require_full_access(
    services: &AppServices,
    principal: &Principal,
    chain: &OwnershipChain,
    denial: &str,
) -> ApiResult<()> {
    match read_access(services, Some(principal), chain).await? {
        AccessLevel::Full => Ok(()),
        AccessLevel::Restricted => Err(ApiError::forbidden(denial)),
    }
}

/// Authorize a mutation inside `chain` and hand back the guard the store
/// re-checks atomically with the write.
pub fn authorize_write(
    principal: &Principal,
    action: Action,
    chain: &OwnershipChain,
) -> ApiResult<OwnerGuard> {
    authorize_mutation(principal, action, &AccessFacts::for_chain(chain, false))?;
    Ok(OwnerGuard::for_principal(principal))
}

pub fn authorize_new_course(principal: &Principal) -> ApiResult<()> {
    authorize_mutation(principal, Action::Create, &AccessFacts::new_course())?;
    Ok(())
}

/// Course owner or admin, for course-management reads (e.g. the roster).
pub fn require_course_staff(principal: &Principal, chain: &OwnershipChain) -> ApiResult<()> {
    match principal.role {
        Role::Admin => Ok(()),
        Role::Instructor if principal.id == chain.instructor_id => Ok(()),
        Role::Instructor | Role::Student => Err(ApiError::forbidden(
            "Only the course owner can perform this action",
        )),
    }
}

/// Admins and instructors.
pub fn require_staff(principal: &Principal) -> ApiResult<()> {
    if principal.role.can_own_courses() {
        Ok(())
    } else {
        Err(ApiError::forbidden("No permission to perform this action"))
    }
}

pub fn require_admin(principal: &Principal) -> ApiResult<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("No permission to perform this action"))
    }
}

/// Unpublished courses exist only for their owner and admins.
pub fn ensure_visible(course: &Course, viewer: Option<&Principal>) -> ApiResult<()> {
    let privileged = viewer.is_some_and(|p| p.is_admin() || p.id == course.instructor_id);
    if course.published || privileged {
        Ok(())
    } else {
        Err(ApiError::not_found("No course found with that ID"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use lms_core::{CourseId, UserId};
    use lms_courses::NewCourse;

    use super::*;

    fn chain(owner: UserId) -> OwnershipChain {
        OwnershipChain {
            course_id: CourseId::new(),
            instructor_id: owner,
        }
    }

    #[test]
    fn instructor_write_guard_carries_identity() {
        let p = Principal::new(UserId::new(), Role::Instructor);
        let guard = authorize_write(&p, Action::Update, &chain(p.id)).unwrap();
        assert_eq!(guard, OwnerGuard::Instructor(p.id));
    }

    #[test]
    fn foreign_instructor_write_is_forbidden() {
        let p = Principal::new(UserId::new(), Role::Instructor);
        let err = authorize_write(&p, Action::Delete, &chain(UserId::new())).unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[test]
    fn admin_write_guard_is_unconditional() {
        let p = Principal::new(UserId::new(), Role::Admin);
        assert_eq!(
            authorize_write(&p, Action::Delete, &chain(UserId::new())).unwrap(),
            OwnerGuard::Any
        );
    }

    #[test]
    fn students_cannot_create_courses() {
        let p = Principal::new(UserId::new(), Role::Student);
        assert!(authorize_new_course(&p).is_err());
        assert!(authorize_new_course(&Principal::new(UserId::new(), Role::Instructor)).is_ok());
    }

    #[test]
    fn unpublished_course_hidden_from_strangers() {
        let owner = UserId::new();
        let course = NewCourse::parse("Draft", None, Some(false), None)
            .unwrap()
            .into_course(owner, Utc::now());

        assert!(ensure_visible(&course, None).is_err());
        assert!(ensure_visible(&course, Some(&Principal::new(UserId::new(), Role::Student))).is_err());
        assert!(ensure_visible(&course, Some(&Principal::new(owner, Role::Instructor))).is_ok());
        assert!(ensure_visible(&course, Some(&Principal::new(UserId::new(), Role::Admin))).is_ok());
    }

    #[test]
    fn roster_is_owner_or_admin_only() {
        let owner = UserId::new();
        let c = chain(owner);
        assert!(require_course_staff(&Principal::new(owner, Role::Instructor), &c).is_ok());
        assert!(require_course_staff(&Principal::new(UserId::new(), Role::Admin), &c).is_ok());
        assert!(require_course_staff(&Principal::new(UserId::new(), Role::Instructor), &c).is_err());
        assert!(require_course_staff(&Principal::new(UserId::new(), Role::Student), &c).is_err());
    }
}

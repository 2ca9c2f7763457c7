//! Authorization engine for the course hierarchy.
//!
//! Every allow/deny decision for courses, modules, lessons, quizzes and
//! enrollments is made here, from facts the caller resolved beforehand:
//!
//! - No IO
//! - No panics
//! - Exhaustive over [`Role`]

use serde::Serialize;
use thiserror::Error;

use lms_core::{CourseId, UserId};

use crate::{Principal, Role};

/// Requested operation on a hierarchy resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::Read)
    }

    fn verb(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// The course at the root of a resource's ownership chain, and its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OwnershipChain {
    pub course_id: CourseId,
    pub instructor_id: UserId,
}

/// Facts about the target resource that a decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessFacts {
    /// Owning instructor of the root course. `None` only when the target is a
    /// course that does not exist yet.
    pub owner: Option<UserId>,
    /// Whether the principal holds an enrollment in the root course.
    pub enrolled: bool,
}

impl AccessFacts {
    /// Facts for creating a brand new root course.
    pub fn new_course() -> Self {
        Self::default()
    }

    pub fn for_chain(chain: &OwnershipChain, enrolled: bool) -> Self {
        Self {
            owner: Some(chain.instructor_id),
            enrolled,
        }
    }
}

/// Outcome of an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Permitted with full visibility.
    Allow,
    /// Read permitted, but only the non-sensitive metadata subset.
    AllowRestricted,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Deny)
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{0}")]
    Forbidden(String),
}

/// Decide whether `principal` may perform `action` on a resource described by `facts`.
pub fn decide(principal: &Principal, action: Action, facts: &AccessFacts) -> Decision {
    match principal.role {
        Role::Admin => Decision::Allow,
        Role::Instructor => {
            let owns = facts.owner == Some(principal.id);
            if action.is_mutation() {
                match facts.owner {
                    None if action == Action::Create => Decision::Allow,
                    Some(_) if owns => Decision::Allow,
                    _ => Decision::Deny,
                }
            } else if owns || facts.enrolled {
                Decision::Allow
            } else {
                Decision::AllowRestricted
            }
        }
        Role::Student => {
            if action.is_mutation() {
                Decision::Deny
            } else if facts.enrolled {
                Decision::Allow
            } else {
                Decision::AllowRestricted
            }
        }
    }
}

/// Read decision for a caller that presented no credentials.
pub fn decide_anonymous_read() -> Decision {
    Decision::AllowRestricted
}

/// [`decide`] for mutations, as a `Result` suitable for `?`.
pub fn authorize_mutation(
    principal: &Principal,
    action: Action,
    facts: &AccessFacts,
) -> Result<(), AuthzError> {
    match decide(principal, action, facts) {
        Decision::Allow => Ok(()),
        Decision::AllowRestricted | Decision::Deny => Err(AuthzError::Forbidden(format!(
            "You do not have permission to {} this resource as you are not the owner of the course",
            action.verb()
        ))),
    }
}

/// Who may create or delete an enrollment of `target` in a course owned by `course_owner`.
pub fn authorize_enrollment(
    principal: &Principal,
    target: UserId,
    course_owner: UserId,
) -> Result<(), AuthzError> {
    if target == principal.id {
        return Ok(());
    }

    match principal.role {
        Role::Admin => Ok(()),
        Role::Instructor if course_owner == principal.id => Ok(()),
        Role::Instructor => Err(AuthzError::Forbidden(
            "Instructors can only manage enrollments for their own courses".to_string(),
        )),
        Role::Student => Err(AuthzError::Forbidden(
            "Students can only manage their own enrollment".to_string(),
        )),
    }
}

/// Who may provision an account with `requested` role.
pub fn authorize_provisioning(principal: &Principal, requested: Role) -> Result<(), AuthzError> {
    match (principal.role, requested) {
        (Role::Admin, _) => Ok(()),
        (Role::Instructor, Role::Student) => Ok(()),
        (Role::Instructor, _) => Err(AuthzError::Forbidden(
            "Instructors can only create students".to_string(),
        )),
        (Role::Student, _) => Err(AuthzError::Forbidden(
            "No permission to perform this action".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Principal {
        Principal::new(UserId::new(), Role::Admin)
    }

    fn instructor() -> Principal {
        Principal::new(UserId::new(), Role::Instructor)
    }

    fn student() -> Principal {
        Principal::new(UserId::new(), Role::Student)
    }

    fn chain_owned_by(owner: UserId) -> OwnershipChain {
        OwnershipChain {
            course_id: CourseId::new(),
            instructor_id: owner,
        }
    }

    const MUTATIONS: [Action; 3] = [Action::Create, Action::Update, Action::Delete];

    #[test]
    fn admin_is_allowed_everything_regardless_of_ownership() {
        let p = admin();
        let foreign = AccessFacts::for_chain(&chain_owned_by(UserId::new()), false);
        for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
            assert_eq!(decide(&p, action, &foreign), Decision::Allow);
        }
        assert_eq!(decide(&p, Action::Create, &AccessFacts::new_course()), Decision::Allow);
    }

    #[test]
    fn instructor_mutates_only_owned_courses() {
        let p = instructor();
        let own = AccessFacts::for_chain(&chain_owned_by(p.id), false);
        let foreign = AccessFacts::for_chain(&chain_owned_by(UserId::new()), false);

        for action in MUTATIONS {
            assert_eq!(decide(&p, action, &own), Decision::Allow);
            assert_eq!(decide(&p, action, &foreign), Decision::Deny);
        }
    }

    #[test]
    fn instructor_enrollment_does_not_grant_mutation() {
        let p = instructor();
        let foreign_enrolled = AccessFacts::for_chain(&chain_owned_by(UserId::new()), true);
        for action in MUTATIONS {
            assert_eq!(decide(&p, action, &foreign_enrolled), Decision::Deny);
        }
        assert_eq!(decide(&p, Action::Read, &foreign_enrolled), Decision::Allow);
    }

    #[test]
    fn instructor_may_create_new_course_but_not_update_without_owner() {
        let p = instructor();
        assert_eq!(decide(&p, Action::Create, &AccessFacts::new_course()), Decision::Allow);
        assert_eq!(decide(&p, Action::Update, &AccessFacts::new_course()), Decision::Deny);
    }

    #[test]
    fn instructor_reads_foreign_course_restricted() {
        let p = instructor();
        let foreign = AccessFacts::for_chain(&chain_owned_by(UserId::new()), false);
        assert_eq!(decide(&p, Action::Read, &foreign), Decision::AllowRestricted);
    }

    #[test]
    fn student_never_mutates() {
        let p = student();
        let enrolled = AccessFacts::for_chain(&chain_owned_by(UserId::new()), true);
        for action in MUTATIONS {
            assert_eq!(decide(&p, action, &enrolled), Decision::Deny);
        }
        assert_eq!(decide(&p, Action::Create, &AccessFacts::new_course()), Decision::Deny);
    }

    #[test]
    fn student_read_depends_on_enrollment() {
        let p = student();
        let chain = chain_owned_by(UserId::new());
        assert_eq!(
            decide(&p, Action::Read, &AccessFacts::for_chain(&chain, true)),
            Decision::Allow
        );
        assert_eq!(
            decide(&p, Action::Read, &AccessFacts::for_chain(&chain, false)),
            Decision::AllowRestricted
        );
    }

    #[test]
    fn authorize_mutation_reports_forbidden() {
        let p = instructor();
        let foreign = AccessFacts::for_chain(&chain_owned_by(UserId::new()), false);
        let err = authorize_mutation(&p, Action::Delete, &foreign).unwrap_err();
        let AuthzError::Forbidden(msg) = err;
        assert!(msg.contains("delete"));
    }

    #[test]
    fn self_enrollment_is_always_permitted() {
        let owner = UserId::new();
        for p in [admin(), instructor(), student()] {
            assert!(authorize_enrollment(&p, p.id, owner).is_ok());
        }
    }

    #[test]
    fn student_cannot_touch_other_enrollments() {
        let p = student();
        assert!(authorize_enrollment(&p, UserId::new(), UserId::new()).is_err());
    }

    #[test]
    fn instructor_manages_enrollments_only_in_owned_course() {
        let p = instructor();
        assert!(authorize_enrollment(&p, UserId::new(), p.id).is_ok());
        assert!(authorize_enrollment(&p, UserId::new(), UserId::new()).is_err());
    }

    #[test]
    fn admin_manages_any_enrollment() {
        let p = admin();
        assert!(authorize_enrollment(&p, UserId::new(), UserId::new()).is_ok());
    }

    #[test]
    fn provisioning_rules() {
        assert!(authorize_provisioning(&admin(), Role::Admin).is_ok());
        assert!(authorize_provisioning(&admin(), Role::Instructor).is_ok());
        assert!(authorize_provisioning(&instructor(), Role::Student).is_ok());
        assert!(authorize_provisioning(&instructor(), Role::Instructor).is_err());
        assert!(authorize_provisioning(&instructor(), Role::Admin).is_err());
        assert!(authorize_provisioning(&student(), Role::Student).is_err());
    }

    #[test]
    fn anonymous_read_is_restricted() {
        assert_eq!(decide_anonymous_read(), Decision::AllowRestricted);
        assert!(decide_anonymous_read().is_allowed());
        assert!(!decide_anonymous_read().is_full());
    }
}

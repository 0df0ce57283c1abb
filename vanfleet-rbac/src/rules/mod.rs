//! Pure access-control and business rules.
//!
//! Every predicate follows the same order, first match wins:
//!
//! 1. Admin is allowed.
//! 2. A fleet owner is allowed when the resource belongs to their fleet.
//! 3. A driver is allowed when the resource hangs off their assigned van.
//! 4. A parent is allowed when they are a guardian of the resource's student.
//! 5. Anyone else is denied.
//!
//! Predicates only read already-resolved scopes; they never suspend, never
//! fail and hold no state.

pub mod absence;
pub mod access;
pub mod invitation;
pub mod subscription;
pub mod trip_log;

use uuid::Uuid;

use crate::context::{StudentScope, VanRef};
use crate::subjects::Subject;

/// A driver is entitled to a van only when both sides of the assignment
/// agree: the actor is assigned to the van and the van names the actor.
pub(crate) fn driver_assigned(subject: &Subject, van: &VanRef) -> bool {
    subject.roles.is_driver()
        && subject.actor.van_id == Some(van.van_id)
        && van.driver_id == Some(subject.id())
}

pub(crate) fn fleet_owner_of(subject: &Subject, fleet_id: Uuid) -> bool {
    subject.roles.is_fleet_owner() && subject.in_fleet(fleet_id)
}

pub(crate) fn driver_of_student(subject: &Subject, student: &StudentScope) -> bool {
    student
        .van
        .as_ref()
        .is_some_and(|van| driver_assigned(subject, van))
}

pub(crate) fn guardian_of(subject: &Subject, student: &StudentScope) -> bool {
    subject.roles.is_parent() && student.has_guardian(subject.id())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use uuid::Uuid;
    use vanfleet_core::types::{Actor, Role, RoleSet};

    use crate::context::{StudentScope, VanRef};
    use crate::subjects::Subject;

    pub fn subject(roles: &[Role]) -> Subject {
        Subject::new(
            Actor::new(Uuid::new_v4(), "someone@vanfleet.test"),
            roles.iter().copied().collect::<RoleSet>(),
        )
    }

    pub fn admin() -> Subject {
        subject(&[Role::Admin])
    }

    pub fn fleet_owner(fleet_id: Uuid) -> Subject {
        let mut owner = subject(&[Role::FleetOwner]);
        owner.actor = owner.actor.with_fleet(fleet_id);
        owner
    }

    /// A driver assigned to a fresh van in `fleet_id`, plus that van.
    pub fn driver(fleet_id: Uuid) -> (Subject, VanRef) {
        let mut driver = subject(&[Role::Driver]);
        let van = VanRef {
            van_id: Uuid::new_v4(),
            fleet_id,
            driver_id: Some(driver.id()),
        };
        driver.actor = driver.actor.with_fleet(fleet_id).with_van(van.van_id);
        (driver, van)
    }

    pub fn student(fleet_id: Uuid, van: Option<VanRef>, guardians: &[Uuid]) -> StudentScope {
        StudentScope {
            student_id: Uuid::new_v4(),
            fleet_id,
            van,
            guardian_ids: guardians.to_vec(),
        }
    }
}

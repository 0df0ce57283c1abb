//! Access, manage and delete rules for fleets, vans, routes, route stops,
//! students, authorized guardians, users and plans.

use uuid::Uuid;

use super::{driver_assigned, driver_of_student, fleet_owner_of, guardian_of};
use crate::context::{FleetScope, GuardianScope, RouteScope, RouteStopScope, StudentScope, VanRef};
use crate::subjects::Subject;

fn owns_fleet(subject: &Subject, fleet: &FleetScope) -> bool {
    subject.roles.is_fleet_owner() && fleet.owner_user_id == subject.id()
}

// Fleets

pub fn can_create_fleet(subject: &Subject) -> bool {
    subject.roles.is_admin_or_fleet_owner()
}

/// Admin, the owning fleet owner, or the driver of any van in the fleet.
pub fn can_access_fleet(subject: &Subject, fleet: &FleetScope) -> bool {
    if subject.roles.is_admin() {
        return true;
    }
    if owns_fleet(subject, fleet) {
        return true;
    }
    fleet.vans.iter().any(|van| driver_assigned(subject, van))
}

pub fn can_manage_fleet(subject: &Subject, fleet: &FleetScope) -> bool {
    subject.roles.is_admin() || owns_fleet(subject, fleet)
}

pub fn can_delete_fleet(subject: &Subject, fleet: &FleetScope) -> bool {
    can_manage_fleet(subject, fleet)
}

// Vans

pub fn can_access_van(subject: &Subject, van: &VanRef) -> bool {
    subject.roles.is_admin()
        || fleet_owner_of(subject, van.fleet_id)
        || driver_assigned(subject, van)
}

/// Also used for creation, with a scope built from the unsaved van.
pub fn can_manage_van(subject: &Subject, van: &VanRef) -> bool {
    subject.roles.is_admin() || fleet_owner_of(subject, van.fleet_id)
}

/// Only the owning side may delete; a non-owner is always denied.
pub fn can_delete_van(subject: &Subject, van: &VanRef) -> bool {
    can_manage_van(subject, van)
}

// Routes

pub fn can_access_route(subject: &Subject, route: &RouteScope) -> bool {
    can_access_van(subject, &route.van)
}

pub fn can_manage_route(subject: &Subject, route: &RouteScope) -> bool {
    can_manage_van(subject, &route.van)
}

pub fn can_delete_route(subject: &Subject, route: &RouteScope) -> bool {
    can_manage_route(subject, route)
}

// Route stops

pub fn can_access_route_stop(subject: &Subject, stop: &RouteStopScope) -> bool {
    can_access_route(subject, &stop.route)
}

/// Drivers record stops on their own route.
pub fn can_manage_route_stop(subject: &Subject, stop: &RouteStopScope) -> bool {
    can_manage_route(subject, &stop.route) || driver_assigned(subject, &stop.route.van)
}

pub fn can_delete_route_stop(subject: &Subject, stop: &RouteStopScope) -> bool {
    can_manage_route(subject, &stop.route)
}

// Students

pub fn can_access_student(subject: &Subject, student: &StudentScope) -> bool {
    if subject.roles.is_admin() || fleet_owner_of(subject, student.fleet_id) {
        return true;
    }
    driver_of_student(subject, student) || guardian_of(subject, student)
}

pub fn can_manage_student(subject: &Subject, student: &StudentScope) -> bool {
    subject.roles.is_admin() || fleet_owner_of(subject, student.fleet_id)
}

pub fn can_delete_student(subject: &Subject, student: &StudentScope) -> bool {
    can_manage_student(subject, student)
}

// Authorized guardians

pub fn can_access_guardian(subject: &Subject, guardian: &GuardianScope) -> bool {
    can_access_student(subject, &guardian.student)
}

/// Parents may maintain the pick-up list of their own children.
pub fn can_manage_guardian(subject: &Subject, guardian: &GuardianScope) -> bool {
    can_manage_student(subject, &guardian.student) || guardian_of(subject, &guardian.student)
}

pub fn can_delete_guardian(subject: &Subject, guardian: &GuardianScope) -> bool {
    can_manage_guardian(subject, guardian)
}

// Users

pub fn can_access_user(subject: &Subject, user_id: Uuid) -> bool {
    subject.roles.is_admin() || subject.id() == user_id
}

pub fn can_update_user(subject: &Subject, user_id: Uuid) -> bool {
    can_access_user(subject, user_id)
}

pub fn can_list_users(subject: &Subject) -> bool {
    subject.roles.is_admin()
}

pub fn can_assign_roles(subject: &Subject) -> bool {
    subject.roles.is_admin()
}

/// Nobody deletes their own account.
pub fn can_delete_user(subject: &Subject, user_id: Uuid) -> bool {
    subject.roles.is_admin() && subject.id() != user_id
}

// Plans

/// Any authenticated role may browse plans.
pub fn can_access_plan(subject: &Subject) -> bool {
    !subject.roles.is_empty()
}

pub fn can_manage_plan(subject: &Subject) -> bool {
    subject.roles.is_admin()
}

pub fn can_delete_plan(subject: &Subject) -> bool {
    subject.roles.is_admin()
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use vanfleet_core::types::Role;

    fn fleet_scope(owner: Uuid, vans: Vec<VanRef>) -> FleetScope {
        FleetScope {
            fleet_id: Uuid::new_v4(),
            owner_user_id: owner,
            vans,
        }
    }

    fn van_in(fleet_id: Uuid) -> VanRef {
        VanRef {
            van_id: Uuid::new_v4(),
            fleet_id,
            driver_id: None,
        }
    }

    #[test]
    fn test_admin_bypasses_ownership() {
        let admin = admin();
        let van = van_in(Uuid::new_v4());
        let kid = student(Uuid::new_v4(), None, &[]);
        let fleet = fleet_scope(Uuid::new_v4(), vec![]);

        assert!(can_access_van(&admin, &van));
        assert!(can_manage_van(&admin, &van));
        assert!(can_access_student(&admin, &kid));
        assert!(can_manage_fleet(&admin, &fleet));
        assert!(can_delete_plan(&admin));
    }

    #[test]
    fn test_no_roles_denies_everything() {
        let nobody = subject(&[]);
        let fleet_id = Uuid::new_v4();
        let mut van = van_in(fleet_id);
        van.driver_id = Some(nobody.id());
        let kid = student(fleet_id, Some(van), &[nobody.id()]);

        assert!(!can_access_van(&nobody, &van));
        assert!(!can_access_student(&nobody, &kid));
        assert!(!can_access_plan(&nobody));
        assert!(!can_create_fleet(&nobody));
    }

    #[test]
    fn test_fleet_owner_scoped_to_own_fleet() {
        let f1 = Uuid::new_v4();
        let owner = fleet_owner(f1);

        assert!(can_manage_van(&owner, &van_in(f1)));
        assert!(!can_manage_van(&owner, &van_in(Uuid::new_v4())));
        assert!(can_delete_van(&owner, &van_in(f1)));
        assert!(!can_delete_van(&owner, &van_in(Uuid::new_v4())));
    }

    #[test]
    fn test_fleet_ownership_uses_owner_id() {
        let owner = fleet_owner(Uuid::new_v4());
        let owned = fleet_scope(owner.id(), vec![]);
        let other = fleet_scope(Uuid::new_v4(), vec![]);

        assert!(can_access_fleet(&owner, &owned));
        assert!(can_delete_fleet(&owner, &owned));
        assert!(!can_access_fleet(&owner, &other));
    }

    #[test]
    fn test_driver_sees_fleet_of_assigned_van_but_cannot_manage() {
        let fleet_id = Uuid::new_v4();
        let (driver, van) = driver(fleet_id);
        let fleet = fleet_scope(Uuid::new_v4(), vec![van_in(fleet_id), van]);

        assert!(can_access_fleet(&driver, &fleet));
        assert!(!can_manage_fleet(&driver, &fleet));
        assert!(can_access_van(&driver, &van));
        assert!(!can_manage_van(&driver, &van));
        assert!(!can_access_van(&driver, &van_in(fleet_id)));
    }

    #[test]
    fn test_route_stop_managed_by_assigned_driver() {
        let fleet_id = Uuid::new_v4();
        let (driver, van) = driver(fleet_id);
        let stop = RouteStopScope {
            stop_id: Uuid::new_v4(),
            route: RouteScope {
                route_id: Uuid::new_v4(),
                van,
            },
        };

        assert!(can_access_route_stop(&driver, &stop));
        assert!(can_manage_route_stop(&driver, &stop));
        assert!(!can_delete_route_stop(&driver, &stop));
        assert!(!can_manage_route(&driver, &stop.route));
    }

    #[test]
    fn test_parent_access_follows_guardian_list() {
        let parent = subject(&[Role::Parent]);
        let fleet_id = Uuid::new_v4();
        let mut kid = student(fleet_id, None, &[parent.id()]);

        assert!(can_access_student(&parent, &kid));
        assert!(!can_manage_student(&parent, &kid));

        kid.guardian_ids.clear();
        assert!(!can_access_student(&parent, &kid));
    }

    #[test]
    fn test_driver_student_access_via_assigned_van() {
        let fleet_id = Uuid::new_v4();
        let (driver, van) = driver(fleet_id);
        let riding = student(fleet_id, Some(van), &[]);
        let elsewhere = student(fleet_id, Some(van_in(fleet_id)), &[]);
        let unassigned = student(fleet_id, None, &[]);

        assert!(can_access_student(&driver, &riding));
        assert!(!can_access_student(&driver, &elsewhere));
        assert!(!can_access_student(&driver, &unassigned));
    }

    #[test]
    fn test_parent_manages_guardians_of_own_child() {
        let parent = subject(&[Role::Parent]);
        let kid = student(Uuid::new_v4(), None, &[parent.id()]);
        let guardian = GuardianScope {
            guardian_id: Uuid::new_v4(),
            student: kid,
        };
        assert!(can_manage_guardian(&parent, &guardian));
        assert!(can_delete_guardian(&parent, &guardian));

        let stranger = subject(&[Role::Parent]);
        assert!(!can_manage_guardian(&stranger, &guardian));
    }

    #[test]
    fn test_user_rules() {
        let admin = admin();
        let user = subject(&[Role::Parent]);

        assert!(can_access_user(&user, user.id()));
        assert!(!can_access_user(&user, admin.id()));
        assert!(can_update_user(&admin, user.id()));
        assert!(can_delete_user(&admin, user.id()));
        assert!(!can_delete_user(&admin, admin.id()));
        assert!(!can_assign_roles(&user));
        assert!(can_access_plan(&user));
        assert!(!can_manage_plan(&user));
    }
}

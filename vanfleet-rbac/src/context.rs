//! Ownership scopes and their resolution.
//!
//! The rules never navigate an object graph. A handler first resolves the
//! ownership chain of the target into a scope with explicit lookups, then
//! passes the scope to a pure predicate. Each resolver method documents the
//! hops it fetches; fields already stored on an entity (a student's fleet,
//! a van's driver) are copied without a lookup.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vanfleet_core::persistence::{Entity, UnitOfWork};
use vanfleet_core::types::{
    AuthorizedGuardian, Fleet, FleetSubscription, ParentInvitation, Route, RouteStop, RoleSet,
    Student, StudentAbsence, StudentTripLog, TripStatus, User, Van,
};

use crate::error::RbacError;
use crate::subjects::Subject;

type RbacResult<T> = vanfleet_core::Result<T>;

/// The assignment facts of one van.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VanRef {
    pub van_id: Uuid,
    pub fleet_id: Uuid,
    pub driver_id: Option<Uuid>,
}

impl From<&Van> for VanRef {
    fn from(van: &Van) -> Self {
        Self {
            van_id: van.id,
            fleet_id: van.fleet_id,
            driver_id: van.driver_id,
        }
    }
}

/// A fleet, its owner and every van in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetScope {
    pub fleet_id: Uuid,
    pub owner_user_id: Uuid,
    pub vans: Vec<VanRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteScope {
    pub route_id: Uuid,
    pub van: VanRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStopScope {
    pub stop_id: Uuid,
    pub route: RouteScope,
}

/// A student's fleet, assigned van and guardians.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentScope {
    pub student_id: Uuid,
    pub fleet_id: Uuid,
    pub van: Option<VanRef>,
    pub guardian_ids: Vec<Uuid>,
}

impl StudentScope {
    pub fn has_guardian(&self, user_id: Uuid) -> bool {
        self.guardian_ids.contains(&user_id)
    }
}

/// A trip log scoped by the van that drove it and the student it logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripLogScope {
    pub trip_log_id: Uuid,
    pub status: TripStatus,
    pub van: VanRef,
    pub student: StudentScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceScope {
    pub absence_id: Uuid,
    pub student: StudentScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianScope {
    pub guardian_id: Uuid,
    pub student: StudentScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationScope {
    pub invitation_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub is_accepted: bool,
    pub student: StudentScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionScope {
    pub subscription_id: Uuid,
    pub fleet: FleetScope,
}

/// Resolves ownership chains through a request's unit of work.
///
/// A missing hop is an error, never a silent deny: the caller learns that a
/// referenced entity does not exist.
pub struct ScopeResolver<'a> {
    uow: &'a UnitOfWork,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(uow: &'a UnitOfWork) -> Self {
        Self { uow }
    }

    /// Load the acting user's ownership links and pair them with the roles
    /// from the session.
    pub async fn subject(&self, user_id: Uuid, roles: RoleSet) -> RbacResult<Subject> {
        let user = self
            .uow
            .get_by_id::<User>(user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| RbacError::UnknownActor(user_id.to_string()))?;
        Ok(Subject::new(user.actor(), roles))
    }

    /// One fetch: the vans of the fleet.
    pub async fn fleet(&self, fleet: &Fleet) -> RbacResult<FleetScope> {
        let vans = self
            .uow
            .find::<Van>(|van| van.fleet_id == fleet.id)
            .await?;
        Ok(FleetScope {
            fleet_id: fleet.id,
            owner_user_id: fleet.owner_user_id,
            vans: vans.iter().map(VanRef::from).collect(),
        })
    }

    /// Two fetches: the fleet, then its vans.
    pub async fn fleet_by_id(&self, fleet_id: Uuid) -> RbacResult<FleetScope> {
        let fleet = self.load::<Fleet>(fleet_id).await?;
        self.fleet(&fleet).await
    }

    /// One fetch: the van.
    pub async fn van_by_id(&self, van_id: Uuid) -> RbacResult<VanRef> {
        let van = self.load::<Van>(van_id).await?;
        Ok(VanRef::from(&van))
    }

    /// One fetch: the route's van.
    pub async fn route(&self, route: &Route) -> RbacResult<RouteScope> {
        Ok(RouteScope {
            route_id: route.id,
            van: self.van_by_id(route.van_id).await?,
        })
    }

    /// Two fetches: the route, then its van.
    pub async fn route_by_id(&self, route_id: Uuid) -> RbacResult<RouteScope> {
        let route = self.load::<Route>(route_id).await?;
        self.route(&route).await
    }

    pub async fn route_stop(&self, stop: &RouteStop) -> RbacResult<RouteStopScope> {
        Ok(RouteStopScope {
            stop_id: stop.id,
            route: self.route_by_id(stop.route_id).await?,
        })
    }

    /// Fleet and guardians are stored on the student; the assigned van is
    /// one fetch when present.
    pub async fn student(&self, student: &Student) -> RbacResult<StudentScope> {
        let van = match student.van_id {
            Some(van_id) => Some(self.van_by_id(van_id).await?),
            None => None,
        };
        Ok(StudentScope {
            student_id: student.id,
            fleet_id: student.fleet_id,
            van,
            guardian_ids: student.guardian_ids.clone(),
        })
    }

    pub async fn student_by_id(&self, student_id: Uuid) -> RbacResult<StudentScope> {
        let student = self.load::<Student>(student_id).await?;
        self.student(&student).await
    }

    /// The log's van plus the student chain.
    pub async fn trip_log(&self, log: &StudentTripLog) -> RbacResult<TripLogScope> {
        Ok(TripLogScope {
            trip_log_id: log.id,
            status: log.status,
            van: self.van_by_id(log.van_id).await?,
            student: self.student_by_id(log.student_id).await?,
        })
    }

    pub async fn absence(&self, absence: &StudentAbsence) -> RbacResult<AbsenceScope> {
        Ok(AbsenceScope {
            absence_id: absence.id,
            student: self.student_by_id(absence.student_id).await?,
        })
    }

    pub async fn guardian(&self, guardian: &AuthorizedGuardian) -> RbacResult<GuardianScope> {
        Ok(GuardianScope {
            guardian_id: guardian.id,
            student: self.student_by_id(guardian.student_id).await?,
        })
    }

    pub async fn invitation(&self, invitation: &ParentInvitation) -> RbacResult<InvitationScope> {
        Ok(InvitationScope {
            invitation_id: invitation.id,
            email: invitation.email.clone(),
            expires_at: invitation.expires_at,
            is_accepted: invitation.is_accepted,
            student: self.student_by_id(invitation.student_id).await?,
        })
    }

    pub async fn subscription(
        &self,
        subscription: &FleetSubscription,
    ) -> RbacResult<SubscriptionScope> {
        Ok(SubscriptionScope {
            subscription_id: subscription.id,
            fleet: self.fleet_by_id(subscription.fleet_id).await?,
        })
    }

    async fn load<T: Entity>(&self, id: Uuid) -> RbacResult<T> {
        self.uow.get_by_id::<T>(id).await?.ok_or_else(|| {
            RbacError::MissingReference {
                entity: T::KIND,
                id: id.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use vanfleet_core::{Cancellation, Error};
    use vanfleet_core::persistence::MemoryStore;
    use vanfleet_core::types::Role;

    fn van(fleet_id: Uuid, driver_id: Option<Uuid>) -> Van {
        Van {
            id: Uuid::new_v4(),
            plate_number: "ABC1D23".into(),
            model: None,
            brand: None,
            capacity: 15,
            is_active: true,
            fleet_id,
            driver_id,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn student(fleet_id: Uuid, van_id: Option<Uuid>) -> Student {
        Student {
            id: Uuid::new_v4(),
            full_name: "Ana".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2015, 4, 1).unwrap(),
            document: None,
            is_active: true,
            fleet_id,
            van_id,
            guardian_ids: vec![Uuid::new_v4()],
            phone_number: None,
            address: None,
            email: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_student_scope_follows_van_hop() {
        let store = Arc::new(MemoryStore::new());
        let fleet_id = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let assigned = van(fleet_id, Some(driver));
        let kid = student(fleet_id, Some(assigned.id));

        let mut uow = UnitOfWork::new(store);
        uow.add(&assigned).unwrap();
        uow.add(&kid).unwrap();
        uow.save_changes(&Cancellation::none()).await.unwrap();

        let scope = ScopeResolver::new(&uow).student(&kid).await.unwrap();
        assert_eq!(scope.fleet_id, fleet_id);
        assert_eq!(scope.van.unwrap().driver_id, Some(driver));
        assert_eq!(scope.guardian_ids, kid.guardian_ids);
    }

    #[tokio::test]
    async fn test_missing_hop_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let uow = UnitOfWork::new(store);
        let orphan = student(Uuid::new_v4(), Some(Uuid::new_v4()));

        let err = ScopeResolver::new(&uow).student(&orphan).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { ref entity, .. } if entity == "Van"));
    }

    #[tokio::test]
    async fn test_unknown_actor() {
        let store = Arc::new(MemoryStore::new());
        let uow = UnitOfWork::new(store);
        let err = ScopeResolver::new(&uow)
            .subject(Uuid::new_v4(), RoleSet::only(Role::Admin))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}

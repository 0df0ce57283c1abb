//! Actions and resource references for audit records

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Action category being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Read
    Access,
    /// Create a new resource under a parent
    Create,
    /// Update
    Manage,
    Delete,
    JustifyAbsence,
    ApproveJustification,
    ChangeStatus,
    AcceptInvitation,
    ResendInvitation,
    RemoveParent,
    AssignRoles,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Access => "access",
            Action::Create => "create",
            Action::Manage => "manage",
            Action::Delete => "delete",
            Action::JustifyAbsence => "justify",
            Action::ApproveJustification => "approve",
            Action::ChangeStatus => "change_status",
            Action::AcceptInvitation => "accept",
            Action::ResendInvitation => "resend",
            Action::RemoveParent => "remove_parent",
            Action::AssignRoles => "assign_roles",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of resource an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Fleet,
    Van,
    Route,
    RouteStop,
    Student,
    StudentAbsence,
    StudentTripLog,
    AuthorizedGuardian,
    ParentInvitation,
    Plan,
    FleetSubscription,
    User,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Fleet => "fleets",
            ResourceKind::Van => "vans",
            ResourceKind::Route => "routes",
            ResourceKind::RouteStop => "route_stops",
            ResourceKind::Student => "students",
            ResourceKind::StudentAbsence => "student_absences",
            ResourceKind::StudentTripLog => "student_trip_logs",
            ResourceKind::AuthorizedGuardian => "authorized_guardians",
            ResourceKind::ParentInvitation => "parent_invitations",
            ResourceKind::Plan => "plans",
            ResourceKind::FleetSubscription => "fleet_subscriptions",
            ResourceKind::User => "users",
        }
    }
}

/// A resource named in an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    /// `None` for collection-level actions such as creating a fleet
    pub id: Option<Uuid>,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: Uuid) -> Self {
        Self { kind, id: Some(id) }
    }

    /// The collection of a kind rather than one member.
    pub fn collection(kind: ResourceKind) -> Self {
        Self { kind, id: None }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}:{}", self.kind.as_str(), id),
            None => write!(f, "{}:*", self.kind.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_display() {
        let id = Uuid::nil();
        assert_eq!(
            ResourceRef::new(ResourceKind::Van, id).to_string(),
            "vans:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(ResourceRef::collection(ResourceKind::Plan).to_string(), "plans:*");
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(Action::ApproveJustification.to_string(), "approve");
        assert_eq!(Action::ChangeStatus.as_str(), "change_status");
    }
}

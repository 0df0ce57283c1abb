//! Subjects of access decisions

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use vanfleet_core::types::{Actor, Role, RoleSet, User};

/// The acting user together with the roles the decision is made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub actor: Actor,
    pub roles: RoleSet,
}

impl Subject {
    pub fn new(actor: Actor, roles: RoleSet) -> Self {
        Self { actor, roles }
    }

    /// Build a subject from a stored user and its own roles.
    pub fn from_user(user: &User) -> Self {
        Self::new(user.actor(), user.roles.clone())
    }

    pub fn id(&self) -> Uuid {
        self.actor.id
    }

    pub fn has(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    /// Whether the actor belongs to the given fleet.
    pub fn in_fleet(&self, fleet_id: Uuid) -> bool {
        self.actor.fleet_id == Some(fleet_id)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.actor.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_display_and_fleet() {
        let fleet = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4(), "d@fleet.test").with_fleet(fleet);
        let subject = Subject::new(actor.clone(), RoleSet::only(Role::Driver));

        assert_eq!(subject.to_string(), format!("user:{}", actor.id));
        assert!(subject.in_fleet(fleet));
        assert!(!subject.in_fleet(Uuid::new_v4()));
        assert!(subject.has(Role::Driver));
        assert!(!subject.has(Role::Parent));
    }
}

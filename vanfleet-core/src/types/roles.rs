//! Role labels and role sets.
//!
//! Roles are a closed enumeration. Parsing an unknown label fails instead of
//! silently producing an empty set, so a typo in a claim can never widen or
//! narrow access by accident.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A role a user may hold. Roles are not mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Platform administrator; bypasses every ownership check.
    Admin,
    /// Owner of a fleet; scoped to resources of that fleet.
    FleetOwner,
    /// Driver; scoped to the van they are assigned to.
    Driver,
    /// Parent; scoped to the students they are a guardian of.
    Parent,
}

impl Role {
    /// Every role, in evaluation order.
    pub const ALL: [Role; 4] = [Role::Admin, Role::FleetOwner, Role::Driver, Role::Parent];

    /// The exact label used in tokens and requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::FleetOwner => "FleetOwner",
            Role::Driver => "Driver",
            Role::Parent => "Parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| Error::validation(format!("Unknown role: {s}")))
    }
}

/// An ordered set of roles held by one actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// An empty role set. Every access predicate denies it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set holding a single role.
    pub fn only(role: Role) -> Self {
        Self(BTreeSet::from([role]))
    }

    /// Parse a list of role labels, failing on the first unknown label.
    pub fn parse<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .map(|label| label.as_ref().parse::<Role>())
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }

    /// Add a role to the set.
    pub fn with(mut self, role: Role) -> Self {
        self.0.insert(role);
        self
    }

    /// Insert a role in place.
    pub fn insert(&mut self, role: Role) {
        self.0.insert(role);
    }

    /// Membership test.
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.contains(Role::Admin)
    }

    pub fn is_fleet_owner(&self) -> bool {
        self.contains(Role::FleetOwner)
    }

    pub fn is_driver(&self) -> bool {
        self.contains(Role::Driver)
    }

    pub fn is_parent(&self) -> bool {
        self.contains(Role::Parent)
    }

    pub fn is_admin_or_fleet_owner(&self) -> bool {
        self.is_admin() || self.is_fleet_owner()
    }

    pub fn is_admin_or_driver(&self) -> bool {
        self.is_admin() || self.is_driver()
    }

    pub fn is_admin_or_parent(&self) -> bool {
        self.is_admin() || self.is_parent()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate roles in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// One claim label per role.
    pub fn to_claims(&self) -> Vec<String> {
        self.iter().map(|role| role.as_str().to_string()).collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(|role| role.as_str()).collect();
        write!(f, "[{}]", labels.join(", "))
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let roles = Vec::<Role>::deserialize(deserializer)?;
        Ok(roles.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_labels_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        assert!("admin".parse::<Role>().is_err());
        assert!(RoleSet::parse(["Admin", "Drivr"]).is_err());
    }

    #[test]
    fn test_combined_checks() {
        let roles = RoleSet::only(Role::Driver).with(Role::Parent);
        assert!(roles.is_admin_or_driver());
        assert!(roles.is_admin_or_parent());
        assert!(!roles.is_admin_or_fleet_owner());
        assert_eq!(roles.to_claims(), vec!["Driver", "Parent"]);
    }

    #[test]
    fn test_serde_uses_labels() {
        let roles = RoleSet::only(Role::FleetOwner);
        let json = serde_json::to_string(&roles).unwrap();
        assert_eq!(json, r#"["FleetOwner"]"#);
        let back: RoleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, roles);
        assert!(serde_json::from_str::<RoleSet>(r#"["Owner"]"#).is_err());
    }
}

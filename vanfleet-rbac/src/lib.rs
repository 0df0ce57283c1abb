//! Role and ownership based access control for VanFleet
//!
//! This crate decides who may read, change and delete each fleet resource.
//! Decisions are pure functions of a [`Subject`](subjects::Subject) (the
//! acting user with a role set) and a resolved ownership scope.
//!
//! # Features
//!
//! - **Fixed roles**: Admin, FleetOwner, Driver and Parent, combinable
//! - **Ownership scopes**: explicit lookups of fleet, van and guardian chains
//! - **Workflow rules**: trip status machine, absence and trip time windows
//! - **Audit Logging**: every decision can be logged with subject and resource
//!
//! # Quick Start
//!
//! ```rust
//! use uuid::Uuid;
//! use vanfleet_core::types::{Actor, Role, RoleSet};
//! use vanfleet_rbac::prelude::*;
//!
//! let fleet_id = Uuid::new_v4();
//! let owner = Subject::new(
//!     Actor::new(Uuid::new_v4(), "owner@example.com").with_fleet(fleet_id),
//!     RoleSet::only(Role::FleetOwner),
//! );
//! let van = VanRef { van_id: Uuid::new_v4(), fleet_id, driver_id: None };
//!
//! let guard = AccessGuard::builder().with_audit_logging(true).build();
//! let allowed = rules::access::can_manage_van(&owner, &van);
//! guard
//!     .enforce(&owner, Action::Manage, &ResourceRef::new(ResourceKind::Van, van.van_id), allowed)
//!     .unwrap();
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod permissions;
pub mod rules;
pub mod subjects;

pub mod prelude {
    //! Common imports for VanFleet RBAC

    pub use crate::config::*;
    pub use crate::context::*;
    pub use crate::error::*;
    pub use crate::middleware::AccessGuard;
    pub use crate::permissions::*;
    pub use crate::rules;
    pub use crate::subjects::*;
}

pub use error::RbacError;
pub use middleware::{AccessGuard, AccessGuardBuilder};

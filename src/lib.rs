//! # VanFleet
//!
//! Backend for multi-tenant school transport fleets: fleet owners, drivers
//! and parents sharing vans, routes, students and trip logs under role and
//! ownership based access control.
//!
//! This crate re-exports the constituent crates:
//! - `vanfleet-core`: domain types, persistence seam, sessions and errors
//! - `vanfleet-rbac`: the access control engine
//! - `vanfleet-server`: command dispatch, handlers and the HTTP surface

pub use vanfleet_core as core;
pub use vanfleet_rbac as rbac;
pub use vanfleet_server as server;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::server::prelude::*;
    pub use vanfleet_rbac::prelude::{
        AccessGuard, Action, ResourceKind, ResourceRef, ScopeResolver, Subject, rules,
    };
}

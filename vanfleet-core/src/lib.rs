//! # VanFleet Core
//!
//! Domain types and shared services for the VanFleet school transport
//! backend.
//!
//! This crate provides the building blocks the access-control engine and
//! the server are written against:
//!
//! - [`types`]: fleets, vans, routes, students, trip logs, absences,
//!   guardians, invitations, plans, subscriptions and users
//! - [`persistence`]: the store seam, a request-scoped unit of work and an
//!   in-memory store
//! - [`session`]: access/refresh token lifecycle and the credential provider
//! - [`clock`] and [`cancellation`]: time source and request cancellation
//! - [`error`]: the error taxonomy shared by every layer
//!
//! ## Example
//!
//! ```rust
//! use vanfleet_core::prelude::*;
//!
//! let roles = RoleSet::parse(["FleetOwner", "Driver"]).unwrap();
//! assert!(roles.is_admin_or_driver());
//! assert!(!roles.is_admin());
//! ```

pub mod cancellation;
pub mod clock;
pub mod error;
pub mod persistence;
pub mod session;
pub mod types;

pub use cancellation::{Cancellation, CancellationSource};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::cancellation::{Cancellation, CancellationSource};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::error::{Error, Result};
    pub use crate::persistence::{Change, Entity, MemoryStore, Store, UnitOfWork};
    pub use crate::session::{
        AccessClaims, IdentityService, JwtSettings, NewUser, TokenPair, TokenService,
    };
    pub use crate::types::*;

    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Duration, Utc};
    pub use uuid::Uuid;
}

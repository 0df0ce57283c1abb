//! Users, actors and persisted refresh tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RoleSet;
use crate::persistence::Entity;

/// A registered user together with their credentials and ownership links.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable identifier
    pub id: Uuid,
    /// Login name; registration keeps the e-mail address here
    pub user_name: String,
    /// Contact and login e-mail, stored lowercase
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Optional phone number
    pub phone_number: Option<String>,
    /// bcrypt hash of the password; never serialized to clients
    pub password_hash: String,
    /// Roles held by the user
    pub roles: RoleSet,
    /// Fleet the user owns or works for
    pub fleet_id: Option<Uuid>,
    /// Van a driver is assigned to
    pub van_id: Option<Uuid>,
    /// Inactive users cannot log in
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last successful login
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// The ownership view of this user used by access decisions.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            email: self.email.clone(),
            fleet_id: self.fleet_id,
            van_id: self.van_id,
        }
    }
}

impl Entity for User {
    const KIND: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// The acting user as seen by the access-control rules.
///
/// Carries identity and ownership links only. Roles travel separately so
/// callers decide whether they come from a token or from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// User id
    pub id: Uuid,
    /// E-mail, compared when accepting invitations
    pub email: String,
    /// Fleet the actor owns or belongs to
    pub fleet_id: Option<Uuid>,
    /// Van the actor drives
    pub van_id: Option<Uuid>,
}

impl Actor {
    /// An actor with no ownership links.
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            fleet_id: None,
            van_id: None,
        }
    }

    /// Attach a fleet.
    pub fn with_fleet(mut self, fleet_id: Uuid) -> Self {
        self.fleet_id = Some(fleet_id);
        self
    }

    /// Attach an assigned van.
    pub fn with_van(mut self, van_id: Uuid) -> Self {
        self.van_id = Some(van_id);
        self
    }
}

/// A persisted refresh token.
///
/// A token is live while it exists and is unexpired. Rotation deletes the
/// row, so a used token can never be found again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    pub id: Uuid,
    /// Opaque base64 value handed to the client
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
    }
}

impl Entity for RefreshToken {
    const KIND: &'static str = "RefreshToken";

    fn id(&self) -> Uuid {
        self.id
    }
}

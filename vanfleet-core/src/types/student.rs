//! Students, their guardians and parent invitations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::persistence::Entity;

/// A student transported by a fleet.
///
/// `fleet_id` is stored on the student directly so fleet-owner checks need
/// no extra fetch. `guardian_ids` lists the parent users entitled to see the
/// student; the assigned van is the only hop that needs a lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub document: Option<String>,
    pub is_active: bool,
    pub fleet_id: Uuid,
    pub van_id: Option<Uuid>,
    /// Parent user ids
    pub guardian_ids: Vec<Uuid>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Student {
    pub fn has_guardian(&self, user_id: Uuid) -> bool {
        self.guardian_ids.contains(&user_id)
    }
}

impl Entity for Student {
    const KIND: &'static str = "Student";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// A person authorized to pick a student up, who need not have an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedGuardian {
    pub id: Uuid,
    pub student_id: Uuid,
    pub full_name: String,
    /// e.g. father, grandmother, uncle
    pub relationship: String,
    pub phone_number: String,
    pub document_id: String,
    /// Free text such as "picks up on Tuesdays"
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for AuthorizedGuardian {
    const KIND: &'static str = "AuthorizedGuardian";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// An invitation for a parent to become a guardian of a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentInvitation {
    pub id: Uuid,
    /// Invited address, stored lowercase
    pub email: String,
    /// Random URL-safe token sent to the invitee
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_accepted: bool,
    pub student_id: Uuid,
    pub invited_by_user_id: Uuid,
}

impl ParentInvitation {
    /// An invitation can be accepted while it is unaccepted and unexpired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_accepted && self.expires_at > now
    }
}

impl Entity for ParentInvitation {
    const KIND: &'static str = "ParentInvitation";

    fn id(&self) -> Uuid {
        self.id
    }
}

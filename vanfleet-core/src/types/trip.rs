//! Trip logs and absences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::GeoPoint;
use crate::persistence::Entity;

/// Lifecycle of a student's trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl TripStatus {
    /// Completed and cancelled trips can no longer be edited. They can
    /// still be cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TripStatus::Pending => "Pending",
            TripStatus::Scheduled => "Scheduled",
            TripStatus::InProgress => "InProgress",
            TripStatus::Completed => "Completed",
            TripStatus::Cancelled => "Cancelled",
            TripStatus::NoShow => "NoShow",
        };
        f.write_str(label)
    }
}

/// One recorded trip of a student, from boarding to dropoff.
///
/// The van is denormalised from the route when the log is created, so the
/// driver and fleet-owner checks resolve it with a single fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTripLog {
    pub id: Uuid,
    pub student_id: Uuid,
    pub route_id: Uuid,
    pub van_id: Uuid,
    pub status: TripStatus,
    pub boarding_time: DateTime<Utc>,
    pub boarding_location: GeoPoint,
    pub dropoff_time: DateTime<Utc>,
    pub dropoff_location: GeoPoint,
}

impl StudentTripLog {
    /// Closed-interval intersection with another `[boarding, dropoff]` window.
    pub fn overlaps(&self, boarding: DateTime<Utc>, dropoff: DateTime<Utc>) -> bool {
        (boarding >= self.boarding_time && boarding <= self.dropoff_time)
            || (dropoff >= self.boarding_time && dropoff <= self.dropoff_time)
            || (boarding <= self.boarding_time && dropoff >= self.dropoff_time)
    }
}

impl Entity for StudentTripLog {
    const KIND: &'static str = "StudentTripLog";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Which legs of the day an absence covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbsenceKind {
    Outbound,
    Return,
    Both,
}

/// A student's absence from a route on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAbsence {
    pub id: Uuid,
    pub student_id: Uuid,
    pub route_id: Uuid,
    pub date: DateTime<Utc>,
    pub kind: AbsenceKind,
    pub reason: String,
    /// Justification text submitted by a parent or the fleet
    pub justification: Option<String>,
    pub justified_by: Option<Uuid>,
    pub justified_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl StudentAbsence {
    pub fn is_justified(&self) -> bool {
        self.justification.is_some()
    }

    pub fn is_approved(&self) -> bool {
        self.approved_at.is_some()
    }
}

impl Entity for StudentAbsence {
    const KIND: &'static str = "StudentAbsence";

    fn id(&self) -> Uuid {
        self.id
    }
}

//! Student trip log rules and the trip status machine.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vanfleet_core::types::{GeoPoint, StudentTripLog, TripStatus};

use super::{driver_assigned, fleet_owner_of, guardian_of};
use crate::context::TripLogScope;
use crate::subjects::Subject;

pub const BOARDING_WINDOW_DAYS: i64 = 7;
pub const MAX_TRIP_HOURS: i64 = 12;

/// Fleet ownership and the driver hop key off the van that drove the trip.
pub fn can_access_trip_log(subject: &Subject, log: &TripLogScope) -> bool {
    subject.roles.is_admin()
        || fleet_owner_of(subject, log.van.fleet_id)
        || driver_assigned(subject, &log.van)
        || guardian_of(subject, &log.student)
}

pub fn can_manage_trip_log(subject: &Subject, log: &TripLogScope) -> bool {
    subject.roles.is_admin()
        || fleet_owner_of(subject, log.van.fleet_id)
        || driver_assigned(subject, &log.van)
}

pub fn can_delete_trip_log(subject: &Subject, log: &TripLogScope) -> bool {
    subject.roles.is_admin() || fleet_owner_of(subject, log.van.fleet_id)
}

/// Any trip may be cancelled, including a completed one. Otherwise only
/// Pending to InProgress and InProgress to Completed.
pub fn is_valid_transition(from: TripStatus, to: TripStatus) -> bool {
    use TripStatus::*;

    match (from, to) {
        (_, Cancelled) => true,
        (Pending, InProgress) | (InProgress, Completed) => true,
        _ => false,
    }
}

pub fn can_change_status(subject: &Subject, log: &TripLogScope, to: TripStatus) -> bool {
    can_manage_trip_log(subject, log) && is_valid_transition(log.status, to)
}

pub fn is_valid_boarding_time(boarding: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    boarding <= now && now - boarding <= Duration::days(BOARDING_WINDOW_DAYS)
}

pub fn is_valid_dropoff_time(
    boarding: DateTime<Utc>,
    dropoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    dropoff > boarding && dropoff <= now && dropoff - boarding <= Duration::hours(MAX_TRIP_HOURS)
}

pub fn is_valid_location(point: &GeoPoint) -> bool {
    point.is_valid()
}

/// Whether another log of the same student intersects `[boarding, dropoff]`.
pub fn has_overlapping_trip(
    existing: &[StudentTripLog],
    student_id: Uuid,
    boarding: DateTime<Utc>,
    dropoff: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> bool {
    existing.iter().any(|log| {
        log.student_id == student_id
            && Some(log.id) != exclude
            && log.overlaps(boarding, dropoff)
    })
}

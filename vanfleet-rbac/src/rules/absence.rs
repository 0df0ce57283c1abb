//! Student absence rules.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vanfleet_core::types::{StudentAbsence, StudentTripLog};

use super::{driver_of_student, fleet_owner_of, guardian_of};
use crate::context::AbsenceScope;
use crate::subjects::Subject;

/// How far back an absence may be recorded.
pub const ABSENCE_WINDOW_DAYS: i64 = 7;

pub fn can_access_absence(subject: &Subject, absence: &AbsenceScope) -> bool {
    let student = &absence.student;
    subject.roles.is_admin()
        || fleet_owner_of(subject, student.fleet_id)
        || driver_of_student(subject, student)
        || guardian_of(subject, student)
}

/// Drivers report absences for students on their van. Parents do not
/// record them.
pub fn can_create_absence(subject: &Subject, absence: &AbsenceScope) -> bool {
    let student = &absence.student;
    subject.roles.is_admin()
        || fleet_owner_of(subject, student.fleet_id)
        || driver_of_student(subject, student)
}

/// A guardian may correct an existing absence of their child.
pub fn can_update_absence(subject: &Subject, absence: &AbsenceScope) -> bool {
    can_create_absence(subject, absence) || guardian_of(subject, &absence.student)
}

pub fn can_delete_absence(subject: &Subject, absence: &AbsenceScope) -> bool {
    subject.roles.is_admin() || fleet_owner_of(subject, absence.student.fleet_id)
}

pub fn can_justify_absence(subject: &Subject, absence: &AbsenceScope) -> bool {
    let student = &absence.student;
    subject.roles.is_admin()
        || fleet_owner_of(subject, student.fleet_id)
        || guardian_of(subject, student)
}

pub fn can_approve_justification(subject: &Subject, absence: &AbsenceScope) -> bool {
    subject.roles.is_admin() || fleet_owner_of(subject, absence.student.fleet_id)
}

/// Not in the future and at most seven days old.
pub fn is_valid_absence_date(date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    date <= now && now - date <= Duration::days(ABSENCE_WINDOW_DAYS)
}

/// Whether the student already has an absence on the same calendar day.
/// `exclude` skips the record being updated.
pub fn has_overlapping_absence(
    existing: &[StudentAbsence],
    student_id: Uuid,
    date: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> bool {
    let day = date.date_naive();
    existing.iter().any(|absence| {
        absence.student_id == student_id
            && Some(absence.id) != exclude
            && absence.date.date_naive() == day
    })
}

/// Whether the student has a trip log boarding or dropping off on the
/// absence day.
pub fn has_overlapping_trip(
    trips: &[StudentTripLog],
    student_id: Uuid,
    date: DateTime<Utc>,
) -> bool {
    let day = date.date_naive();
    trips.iter().any(|trip| {
        trip.student_id == student_id
            && (trip.boarding_time.date_naive() == day || trip.dropoff_time.date_naive() == day)
    })
}

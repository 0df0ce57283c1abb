//! Parent invitation and guardian-list rules.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vanfleet_core::types::ParentInvitation;

use super::access::can_access_student;
use super::fleet_owner_of;
use crate::context::{InvitationScope, StudentScope};
use crate::subjects::Subject;

pub const MAX_GUARDIANS: usize = 4;
pub const INVITATION_TTL_DAYS: i64 = 7;
/// How long after expiry an invitation may still be resent.
pub const RESEND_GRACE_DAYS: i64 = 7;

pub fn can_create_invitation(subject: &Subject, student: &StudentScope) -> bool {
    subject.roles.is_admin() || fleet_owner_of(subject, student.fleet_id)
}

pub fn can_access_invitation(subject: &Subject, invitation: &InvitationScope) -> bool {
    can_create_invitation(subject, &invitation.student)
}

pub fn can_delete_invitation(subject: &Subject, invitation: &InvitationScope) -> bool {
    can_create_invitation(subject, &invitation.student)
}

/// The invitee accepts with the invited address while the invitation is
/// still open. The comparison ignores case.
pub fn can_accept_invitation(
    subject: &Subject,
    invitation: &InvitationScope,
    now: DateTime<Utc>,
) -> bool {
    !invitation.is_accepted
        && invitation.expires_at > now
        && invitation.email.eq_ignore_ascii_case(&subject.actor.email)
}

pub fn can_resend_invitation(
    subject: &Subject,
    invitation: &InvitationScope,
    now: DateTime<Utc>,
) -> bool {
    can_create_invitation(subject, &invitation.student)
        && !invitation.is_accepted
        && now - invitation.expires_at <= Duration::days(RESEND_GRACE_DAYS)
}

pub fn has_reached_max_guardians(student: &StudentScope) -> bool {
    student.guardian_ids.len() >= MAX_GUARDIANS
}

pub fn is_already_guardian(student: &StudentScope, user_id: Uuid) -> bool {
    student.has_guardian(user_id)
}

/// Whether an open invitation for the same student and address exists.
pub fn has_pending_invitation(
    invitations: &[ParentInvitation],
    student_id: Uuid,
    email: &str,
    now: DateTime<Utc>,
) -> bool {
    invitations.iter().any(|invitation| {
        invitation.student_id == student_id
            && invitation.email.eq_ignore_ascii_case(email)
            && invitation.is_valid(now)
    })
}

/// A student always keeps at least one guardian.
pub fn can_remove_parent(subject: &Subject, student: &StudentScope, parent_id: Uuid) -> bool {
    can_access_student(subject, student)
        && student.guardian_ids.len() > 1
        && student.has_guardian(parent_id)
}

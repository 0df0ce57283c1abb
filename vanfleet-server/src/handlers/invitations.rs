//! Parent invitations: how a parent becomes a student's guardian.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use vanfleet_core::session::generate_invitation_token;
use vanfleet_core::session::identity::normalize_email;
use vanfleet_core::types::{ParentInvitation, Role, Student, User};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::InvitationScope;
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::{access, invitation as rules};

use super::{Request, RequestContext, RequestHandler};

/// An invitation as shown to the inviting side; the token only travels by
/// e-mail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    pub id: Uuid,
    pub email: String,
    pub student_id: Uuid,
    pub invited_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_accepted: bool,
}

impl From<&ParentInvitation> for InvitationView {
    fn from(invitation: &ParentInvitation) -> Self {
        Self {
            id: invitation.id,
            email: invitation.email.clone(),
            student_id: invitation.student_id,
            invited_by_user_id: invitation.invited_by_user_id,
            created_at: invitation.created_at,
            expires_at: invitation.expires_at,
            is_accepted: invitation.is_accepted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitation {
    pub student_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptInvitation {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendInvitation {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveParent {
    pub student_id: Uuid,
    pub parent_id: Uuid,
}

impl Request for CreateInvitation {
    type Response = InvitationView;
    const NAME: &'static str = "CreateInvitation";
}

impl Request for AcceptInvitation {
    type Response = InvitationView;
    const NAME: &'static str = "AcceptInvitation";
}

impl Request for ResendInvitation {
    type Response = InvitationView;
    const NAME: &'static str = "ResendInvitation";
}

impl Request for RemoveParent {
    type Response = Student;
    const NAME: &'static str = "RemoveParent";
}

fn expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(rules::INVITATION_TTL_DAYS)
}

pub struct InvitationHandlers;

#[async_trait]
impl RequestHandler<CreateInvitation> for InvitationHandlers {
    async fn handle(
        &self,
        request: CreateInvitation,
        ctx: &mut RequestContext,
    ) -> Result<InvitationView> {
        let subject = ctx.subject().await?;
        let student = ctx.resolver().student_by_id(request.student_id).await?;
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::ParentInvitation,
            None,
            rules::can_create_invitation(&subject, &student),
        )?;

        let email = normalize_email(&request.email)?;
        if let Some(user) = ctx.services.identity.find_by_email(&ctx.uow, &email).await? {
            if rules::is_already_guardian(&student, user.id) {
                return Err(Error::validation("This parent is already a guardian of the student"));
            }
        }
        if rules::has_reached_max_guardians(&student) {
            return Err(Error::validation(format!(
                "A student may have at most {} guardians",
                rules::MAX_GUARDIANS
            )));
        }
        let now = ctx.now();
        let open = ctx
            .uow
            .find::<ParentInvitation>(|i| i.student_id == student.student_id)
            .await?;
        if rules::has_pending_invitation(&open, student.student_id, &email, now) {
            return Err(Error::validation(
                "An invitation for this e-mail is already pending",
            ));
        }

        let invitation = ParentInvitation {
            id: Uuid::new_v4(),
            email,
            token: generate_invitation_token(),
            created_at: now,
            expires_at: expiry(now),
            is_accepted: false,
            student_id: student.student_id,
            invited_by_user_id: subject.id(),
        };
        ctx.uow.add(&invitation)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            invitation = %invitation.id,
            email = %invitation.email,
            "Invitation e-mail queued"
        );
        Ok(InvitationView::from(&invitation))
    }
}

#[async_trait]
impl RequestHandler<AcceptInvitation> for InvitationHandlers {
    async fn handle(
        &self,
        request: AcceptInvitation,
        ctx: &mut RequestContext,
    ) -> Result<InvitationView> {
        let subject = ctx.subject().await?;
        let token = request.token.trim().to_string();
        let mut invitation = ctx
            .uow
            .find::<ParentInvitation>(|i| i.token == token)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("ParentInvitation", "token"))?;
        let scope = ctx.resolver().invitation(&invitation).await?;
        let now = ctx.now();
        ctx.enforce(
            &subject,
            Action::AcceptInvitation,
            ResourceKind::ParentInvitation,
            Some(invitation.id),
            rules::can_accept_invitation(&subject, &scope, now),
        )?;
        if rules::is_already_guardian(&scope.student, subject.id()) {
            return Err(Error::validation("You are already a guardian of the student"));
        }
        if rules::has_reached_max_guardians(&scope.student) {
            return Err(Error::validation(format!(
                "A student may have at most {} guardians",
                rules::MAX_GUARDIANS
            )));
        }

        let mut student = ctx.uow.require::<Student>(invitation.student_id).await?;
        student.guardian_ids.push(subject.id());
        student.updated_at = Some(now);
        ctx.uow.update(&student)?;

        let mut parent = ctx.uow.require::<User>(subject.id()).await?;
        if !parent.roles.is_parent() {
            parent.roles.insert(Role::Parent);
            ctx.uow.update(&parent)?;
        }

        invitation.is_accepted = true;
        ctx.uow.update(&invitation)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            invitation = %invitation.id,
            student = %student.id,
            "Accepted invitation"
        );
        Ok(InvitationView::from(&invitation))
    }
}

#[async_trait]
impl RequestHandler<ResendInvitation> for InvitationHandlers {
    async fn handle(
        &self,
        request: ResendInvitation,
        ctx: &mut RequestContext,
    ) -> Result<InvitationView> {
        let subject = ctx.subject().await?;
        let mut invitation = ctx.uow.require::<ParentInvitation>(request.id).await?;
        let scope: InvitationScope = ctx.resolver().invitation(&invitation).await?;
        ctx.enforce(
            &subject,
            Action::ResendInvitation,
            ResourceKind::ParentInvitation,
            Some(invitation.id),
            rules::can_access_invitation(&subject, &scope),
        )?;
        let now = ctx.now();
        if !rules::can_resend_invitation(&subject, &scope, now) {
            return Err(Error::validation(format!(
                "Only open invitations up to {} days past expiry can be resent",
                rules::RESEND_GRACE_DAYS
            )));
        }

        invitation.token = generate_invitation_token();
        invitation.expires_at = expiry(now);
        ctx.uow.update(&invitation)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            invitation = %invitation.id,
            email = %invitation.email,
            "Invitation e-mail queued"
        );
        Ok(InvitationView::from(&invitation))
    }
}

#[async_trait]
impl RequestHandler<RemoveParent> for InvitationHandlers {
    async fn handle(&self, request: RemoveParent, ctx: &mut RequestContext) -> Result<Student> {
        let subject = ctx.subject().await?;
        let mut student = ctx.uow.require::<Student>(request.student_id).await?;
        let scope = ctx.resolver().student(&student).await?;
        ctx.enforce(
            &subject,
            Action::RemoveParent,
            ResourceKind::Student,
            Some(student.id),
            access::can_access_student(&subject, &scope),
        )?;
        if !rules::can_remove_parent(&subject, &scope, request.parent_id) {
            return Err(Error::validation(
                "The parent is not a guardian, or is the student's last guardian",
            ));
        }

        student.guardian_ids.retain(|id| *id != request.parent_id);
        student.updated_at = Some(ctx.now());
        ctx.uow.update(&student)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            student = %student.id,
            parent = %request.parent_id,
            "Removed parent"
        );
        Ok(student)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::Harness;
    use vanfleet_core::Clock;

    async fn token_of(harness: &Harness, id: Uuid) -> String {
        harness.get::<ParentInvitation>(id).await.unwrap().token
    }

    #[tokio::test]
    async fn test_invite_and_accept() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        let student = harness.student(&fleet, None, &[]).await;
        let invitee = harness.user(&[Role::FleetOwner], None, None).await;

        let view = InvitationHandlers
            .handle(
                CreateInvitation {
                    student_id: student.id,
                    email: invitee.email.to_uppercase(),
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();
        assert_eq!(view.email, invitee.email);
        assert_eq!(view.expires_at, harness.clock.now() + Duration::days(7));

        let duplicate = InvitationHandlers
            .handle(
                CreateInvitation {
                    student_id: student.id,
                    email: invitee.email.clone(),
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap_err();
        assert_eq!(duplicate.status_code(), 400);

        let token = token_of(&harness, view.id).await;
        let accepted = InvitationHandlers
            .handle(AcceptInvitation { token }, &mut harness.as_user(&invitee))
            .await
            .unwrap();
        assert!(accepted.is_accepted);

        let student = harness.get::<Student>(student.id).await.unwrap();
        assert_eq!(student.guardian_ids, vec![invitee.id]);
        let parent = harness.get::<User>(invitee.id).await.unwrap();
        assert!(parent.roles.is_parent());
        assert!(parent.roles.is_fleet_owner());
    }

    #[tokio::test]
    async fn test_accept_requires_matching_email_and_open_invitation() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        let student = harness.student(&fleet, None, &[]).await;
        let invitee = harness.user(&[Role::Parent], None, None).await;
        let intruder = harness.user(&[Role::Parent], None, None).await;

        let view = InvitationHandlers
            .handle(
                CreateInvitation {
                    student_id: student.id,
                    email: invitee.email.clone(),
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();
        let token = token_of(&harness, view.id).await;

        let wrong_person = InvitationHandlers
            .handle(AcceptInvitation { token: token.clone() }, &mut harness.as_user(&intruder))
            .await
            .unwrap_err();
        assert!(matches!(wrong_person, Error::Forbidden));

        let unknown = InvitationHandlers
            .handle(
                AcceptInvitation { token: "nope".into() },
                &mut harness.as_user(&invitee),
            )
            .await
            .unwrap_err();
        assert_eq!(unknown.status_code(), 404);

        harness.clock.advance(Duration::days(8));
        let expired = InvitationHandlers
            .handle(AcceptInvitation { token: token.clone() }, &mut harness.as_user(&invitee))
            .await
            .unwrap_err();
        assert!(matches!(expired, Error::Forbidden));

        let resent = InvitationHandlers
            .handle(ResendInvitation { id: view.id }, &mut harness.as_user(&owner))
            .await
            .unwrap();
        assert!(resent.expires_at > harness.clock.now());
        assert_ne!(token_of(&harness, view.id).await, token);

        harness.clock.advance(Duration::days(15));
        let too_late = InvitationHandlers
            .handle(ResendInvitation { id: view.id }, &mut harness.as_user(&owner))
            .await
            .unwrap_err();
        assert_eq!(too_late.status_code(), 400);
    }

    #[tokio::test]
    async fn test_guardian_limits() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        let guardians: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let full = harness.student(&fleet, None, &guardians).await;

        let err = InvitationHandlers
            .handle(
                CreateInvitation {
                    student_id: full.id,
                    email: "fifth@vanfleet.test".into(),
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let parent = harness.user(&[Role::Parent], None, None).await;
        let single = harness.student(&fleet, None, &[parent.id]).await;
        let last = InvitationHandlers
            .handle(
                RemoveParent {
                    student_id: single.id,
                    parent_id: parent.id,
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap_err();
        assert_eq!(last.status_code(), 400);

        let removed = InvitationHandlers
            .handle(
                RemoveParent {
                    student_id: full.id,
                    parent_id: guardians[0],
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();
        assert_eq!(removed.guardian_ids.len(), 3);
    }
}

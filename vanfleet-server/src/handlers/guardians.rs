//! Adults authorized to pick a student up.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::AuthorizedGuardian;
use vanfleet_core::Result;
use vanfleet_rbac::context::GuardianScope;
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::access;

use super::{Request, RequestContext, RequestHandler, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianInput {
    pub full_name: String,
    pub relationship: String,
    pub phone_number: String,
    pub document_id: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuardian {
    pub student_id: Uuid,
    #[serde(flatten)]
    pub guardian: GuardianInput,
}

#[derive(Debug, Clone)]
pub struct UpdateGuardian {
    pub id: Uuid,
    pub guardian: GuardianInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteGuardian {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetGuardianById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetGuardiansByStudent {
    pub student_id: Uuid,
}

impl Request for CreateGuardian {
    type Response = AuthorizedGuardian;
    const NAME: &'static str = "CreateGuardian";
}

impl Request for UpdateGuardian {
    type Response = AuthorizedGuardian;
    const NAME: &'static str = "UpdateGuardian";
}

impl Request for DeleteGuardian {
    type Response = ();
    const NAME: &'static str = "DeleteGuardian";
}

impl Request for GetGuardianById {
    type Response = AuthorizedGuardian;
    const NAME: &'static str = "GetGuardianById";
}

impl Request for GetGuardiansByStudent {
    type Response = Vec<AuthorizedGuardian>;
    const NAME: &'static str = "GetGuardiansByStudent";
}

fn validate(input: &GuardianInput) -> Result<()> {
    require_text("Full name", &input.full_name)?;
    require_text("Relationship", &input.relationship)?;
    require_text("Phone number", &input.phone_number)?;
    require_text("Document", &input.document_id)
}

fn apply(guardian: &mut AuthorizedGuardian, input: GuardianInput) {
    guardian.full_name = input.full_name.trim().to_string();
    guardian.relationship = input.relationship.trim().to_string();
    guardian.phone_number = input.phone_number.trim().to_string();
    guardian.document_id = input.document_id.trim().to_string();
    guardian.description = input.description;
}

pub struct GuardianHandlers;

impl GuardianHandlers {
    async fn load(ctx: &RequestContext, id: Uuid) -> Result<(AuthorizedGuardian, GuardianScope)> {
        let guardian = ctx.uow.require::<AuthorizedGuardian>(id).await?;
        let scope = ctx.resolver().guardian(&guardian).await?;
        Ok((guardian, scope))
    }
}

#[async_trait]
impl RequestHandler<CreateGuardian> for GuardianHandlers {
    async fn handle(
        &self,
        request: CreateGuardian,
        ctx: &mut RequestContext,
    ) -> Result<AuthorizedGuardian> {
        let subject = ctx.subject().await?;
        let student = ctx.resolver().student_by_id(request.student_id).await?;
        let mut guardian = AuthorizedGuardian {
            id: Uuid::new_v4(),
            student_id: student.student_id,
            full_name: String::new(),
            relationship: String::new(),
            phone_number: String::new(),
            document_id: String::new(),
            description: String::new(),
            created_at: ctx.now(),
        };
        let scope = GuardianScope {
            guardian_id: guardian.id,
            student,
        };
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::AuthorizedGuardian,
            Some(guardian.id),
            access::can_manage_guardian(&subject, &scope),
        )?;
        validate(&request.guardian)?;

        apply(&mut guardian, request.guardian);
        ctx.uow.add(&guardian)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            guardian = %guardian.id,
            student = %guardian.student_id,
            "Authorized guardian"
        );
        Ok(guardian)
    }
}

#[async_trait]
impl RequestHandler<UpdateGuardian> for GuardianHandlers {
    async fn handle(
        &self,
        request: UpdateGuardian,
        ctx: &mut RequestContext,
    ) -> Result<AuthorizedGuardian> {
        let subject = ctx.subject().await?;
        let (mut guardian, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::AuthorizedGuardian,
            Some(guardian.id),
            access::can_manage_guardian(&subject, &scope),
        )?;
        validate(&request.guardian)?;

        apply(&mut guardian, request.guardian);
        ctx.uow.update(&guardian)?;
        ctx.save().await?;

        info!(actor = %subject.id(), guardian = %guardian.id, "Updated guardian");
        Ok(guardian)
    }
}

#[async_trait]
impl RequestHandler<DeleteGuardian> for GuardianHandlers {
    async fn handle(&self, request: DeleteGuardian, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let (guardian, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::AuthorizedGuardian,
            Some(guardian.id),
            access::can_delete_guardian(&subject, &scope),
        )?;

        ctx.uow.delete(&guardian);
        ctx.save().await?;

        info!(actor = %subject.id(), guardian = %guardian.id, "Removed guardian");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetGuardianById> for GuardianHandlers {
    async fn handle(
        &self,
        request: GetGuardianById,
        ctx: &mut RequestContext,
    ) -> Result<AuthorizedGuardian> {
        let subject = ctx.subject().await?;
        let (guardian, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::AuthorizedGuardian,
            Some(guardian.id),
            access::can_access_guardian(&subject, &scope),
        )?;
        Ok(guardian)
    }
}

#[async_trait]
impl RequestHandler<GetGuardiansByStudent> for GuardianHandlers {
    async fn handle(
        &self,
        request: GetGuardiansByStudent,
        ctx: &mut RequestContext,
    ) -> Result<Vec<AuthorizedGuardian>> {
        let subject = ctx.subject().await?;
        let student = ctx.resolver().student_by_id(request.student_id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Student,
            Some(student.student_id),
            access::can_access_student(&subject, &student),
        )?;
        let mut guardians = ctx
            .uow
            .find::<AuthorizedGuardian>(|g| g.student_id == student.student_id)
            .await?;
        guardians.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(guardians)
    }
}

//! Student absences and their justification workflow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{AbsenceKind, Route, StudentAbsence, StudentTripLog};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::AbsenceScope;
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::absence as rules;

use super::{Request, RequestContext, RequestHandler, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceInput {
    pub route_id: Uuid,
    pub date: DateTime<Utc>,
    pub kind: AbsenceKind,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAbsence {
    pub student_id: Uuid,
    #[serde(flatten)]
    pub absence: AbsenceInput,
}

#[derive(Debug, Clone)]
pub struct UpdateAbsence {
    pub id: Uuid,
    pub absence: AbsenceInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteAbsence {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JustifyAbsence {
    #[serde(default)]
    pub id: Uuid,
    pub justification: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveJustification {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetAbsenceById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAbsencesByStudent {
    pub student_id: Uuid,
}

impl Request for CreateAbsence {
    type Response = StudentAbsence;
    const NAME: &'static str = "CreateAbsence";
}

impl Request for UpdateAbsence {
    type Response = StudentAbsence;
    const NAME: &'static str = "UpdateAbsence";
}

impl Request for DeleteAbsence {
    type Response = ();
    const NAME: &'static str = "DeleteAbsence";
}

impl Request for JustifyAbsence {
    type Response = StudentAbsence;
    const NAME: &'static str = "JustifyAbsence";
}

impl Request for ApproveJustification {
    type Response = StudentAbsence;
    const NAME: &'static str = "ApproveJustification";
}

impl Request for GetAbsenceById {
    type Response = StudentAbsence;
    const NAME: &'static str = "GetAbsenceById";
}

impl Request for GetAbsencesByStudent {
    type Response = Vec<StudentAbsence>;
    const NAME: &'static str = "GetAbsencesByStudent";
}

/// Date window, reason, route, and no clash with another absence or a trip
/// on the same day.
async fn validate(
    ctx: &RequestContext,
    student_id: Uuid,
    input: &AbsenceInput,
    exclude: Option<Uuid>,
) -> Result<()> {
    if !rules::is_valid_absence_date(input.date, ctx.now()) {
        return Err(Error::validation(format!(
            "Absences must be dated within the last {} days",
            rules::ABSENCE_WINDOW_DAYS
        )));
    }
    require_text("Reason", &input.reason)?;
    ctx.uow.require::<Route>(input.route_id).await?;

    let absences = ctx
        .uow
        .find::<StudentAbsence>(|a| a.student_id == student_id)
        .await?;
    if rules::has_overlapping_absence(&absences, student_id, input.date, exclude) {
        return Err(Error::validation(
            "The student already has an absence on that day",
        ));
    }
    let trips = ctx
        .uow
        .find::<StudentTripLog>(|t| t.student_id == student_id)
        .await?;
    if rules::has_overlapping_trip(&trips, student_id, input.date) {
        return Err(Error::validation(
            "The student has a recorded trip on that day",
        ));
    }
    Ok(())
}

pub struct AbsenceHandlers;

impl AbsenceHandlers {
    async fn load(ctx: &RequestContext, id: Uuid) -> Result<(StudentAbsence, AbsenceScope)> {
        let absence = ctx.uow.require::<StudentAbsence>(id).await?;
        let scope = ctx.resolver().absence(&absence).await?;
        Ok((absence, scope))
    }
}

#[async_trait]
impl RequestHandler<CreateAbsence> for AbsenceHandlers {
    async fn handle(
        &self,
        request: CreateAbsence,
        ctx: &mut RequestContext,
    ) -> Result<StudentAbsence> {
        let subject = ctx.subject().await?;
        let student = ctx.resolver().student_by_id(request.student_id).await?;
        let input = request.absence;
        let absence = StudentAbsence {
            id: Uuid::new_v4(),
            student_id: student.student_id,
            route_id: input.route_id,
            date: input.date,
            kind: input.kind,
            reason: input.reason.trim().to_string(),
            justification: None,
            justified_by: None,
            justified_at: None,
            approved_by: None,
            approved_at: None,
        };
        let scope = AbsenceScope {
            absence_id: absence.id,
            student,
        };
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::StudentAbsence,
            Some(absence.id),
            rules::can_create_absence(&subject, &scope),
        )?;
        validate(ctx, absence.student_id, &input, None).await?;

        ctx.uow.add(&absence)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            absence = %absence.id,
            student = %absence.student_id,
            "Recorded absence"
        );
        Ok(absence)
    }
}

#[async_trait]
impl RequestHandler<UpdateAbsence> for AbsenceHandlers {
    async fn handle(
        &self,
        request: UpdateAbsence,
        ctx: &mut RequestContext,
    ) -> Result<StudentAbsence> {
        let subject = ctx.subject().await?;
        let (mut absence, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::StudentAbsence,
            Some(absence.id),
            rules::can_update_absence(&subject, &scope),
        )?;
        let input = request.absence;
        validate(ctx, absence.student_id, &input, Some(absence.id)).await?;

        absence.route_id = input.route_id;
        absence.date = input.date;
        absence.kind = input.kind;
        absence.reason = input.reason.trim().to_string();
        ctx.uow.update(&absence)?;
        ctx.save().await?;

        info!(actor = %subject.id(), absence = %absence.id, "Updated absence");
        Ok(absence)
    }
}

#[async_trait]
impl RequestHandler<DeleteAbsence> for AbsenceHandlers {
    async fn handle(&self, request: DeleteAbsence, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let (absence, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::StudentAbsence,
            Some(absence.id),
            rules::can_delete_absence(&subject, &scope),
        )?;

        ctx.uow.delete(&absence);
        ctx.save().await?;

        info!(actor = %subject.id(), absence = %absence.id, "Deleted absence");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<JustifyAbsence> for AbsenceHandlers {
    async fn handle(
        &self,
        request: JustifyAbsence,
        ctx: &mut RequestContext,
    ) -> Result<StudentAbsence> {
        let subject = ctx.subject().await?;
        let (mut absence, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::JustifyAbsence,
            ResourceKind::StudentAbsence,
            Some(absence.id),
            rules::can_justify_absence(&subject, &scope),
        )?;
        require_text("Justification", &request.justification)?;

        // A new justification needs a fresh approval
        absence.justification = Some(request.justification.trim().to_string());
        absence.justified_by = Some(subject.id());
        absence.justified_at = Some(ctx.now());
        absence.approved_by = None;
        absence.approved_at = None;
        ctx.uow.update(&absence)?;
        ctx.save().await?;

        info!(actor = %subject.id(), absence = %absence.id, "Justified absence");
        Ok(absence)
    }
}

#[async_trait]
impl RequestHandler<ApproveJustification> for AbsenceHandlers {
    async fn handle(
        &self,
        request: ApproveJustification,
        ctx: &mut RequestContext,
    ) -> Result<StudentAbsence> {
        let subject = ctx.subject().await?;
        let (mut absence, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::ApproveJustification,
            ResourceKind::StudentAbsence,
            Some(absence.id),
            rules::can_approve_justification(&subject, &scope),
        )?;
        if !absence.is_justified() {
            return Err(Error::validation("The absence has not been justified"));
        }

        absence.approved_by = Some(subject.id());
        absence.approved_at = Some(ctx.now());
        ctx.uow.update(&absence)?;
        ctx.save().await?;

        info!(actor = %subject.id(), absence = %absence.id, "Approved absence justification");
        Ok(absence)
    }
}

#[async_trait]
impl RequestHandler<GetAbsenceById> for AbsenceHandlers {
    async fn handle(
        &self,
        request: GetAbsenceById,
        ctx: &mut RequestContext,
    ) -> Result<StudentAbsence> {
        let subject = ctx.subject().await?;
        let (absence, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::StudentAbsence,
            Some(absence.id),
            rules::can_access_absence(&subject, &scope),
        )?;
        Ok(absence)
    }
}

#[async_trait]
impl RequestHandler<GetAbsencesByStudent> for AbsenceHandlers {
    async fn handle(
        &self,
        request: GetAbsencesByStudent,
        ctx: &mut RequestContext,
    ) -> Result<Vec<StudentAbsence>> {
        let subject = ctx.subject().await?;
        let student = ctx.resolver().student_by_id(request.student_id).await?;
        let scope = AbsenceScope {
            absence_id: Uuid::nil(),
            student,
        };
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Student,
            Some(request.student_id),
            rules::can_access_absence(&subject, &scope),
        )?;
        let mut absences = ctx
            .uow
            .find::<StudentAbsence>(|a| a.student_id == request.student_id)
            .await?;
        absences.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(absences)
    }
}

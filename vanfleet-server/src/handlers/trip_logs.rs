//! Trip logs: who boarded which van, where and when.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{GeoPoint, Route, StudentTripLog, TripStatus};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::{StudentScope, TripLogScope};
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::{access, trip_log as rules};
use vanfleet_rbac::subjects::Subject;

use super::{Request, RequestContext, RequestHandler};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripLogInput {
    pub boarding_time: DateTime<Utc>,
    pub boarding_location: GeoPoint,
    pub dropoff_time: DateTime<Utc>,
    pub dropoff_location: GeoPoint,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripLog {
    pub student_id: Uuid,
    pub route_id: Uuid,
    #[serde(flatten)]
    pub trip: TripLogInput,
}

#[derive(Debug, Clone)]
pub struct UpdateTripLog {
    pub id: Uuid,
    pub trip: TripLogInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeTripStatus {
    #[serde(default)]
    pub id: Uuid,
    pub status: TripStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteTripLog {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetTripLogById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTripLogsByStudent {
    pub student_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTripLogsByVan {
    pub van_id: Uuid,
}

impl Request for CreateTripLog {
    type Response = StudentTripLog;
    const NAME: &'static str = "CreateTripLog";
}

impl Request for UpdateTripLog {
    type Response = StudentTripLog;
    const NAME: &'static str = "UpdateTripLog";
}

impl Request for ChangeTripStatus {
    type Response = StudentTripLog;
    const NAME: &'static str = "ChangeTripStatus";
}

impl Request for DeleteTripLog {
    type Response = ();
    const NAME: &'static str = "DeleteTripLog";
}

impl Request for GetTripLogById {
    type Response = StudentTripLog;
    const NAME: &'static str = "GetTripLogById";
}

impl Request for GetTripLogsByStudent {
    type Response = Vec<StudentTripLog>;
    const NAME: &'static str = "GetTripLogsByStudent";
}

impl Request for GetTripLogsByVan {
    type Response = Vec<StudentTripLog>;
    const NAME: &'static str = "GetTripLogsByVan";
}

async fn validate(
    ctx: &RequestContext,
    scope: &TripLogScope,
    input: &TripLogInput,
    exclude: Option<Uuid>,
) -> Result<()> {
    let now = ctx.now();
    if scope.student.fleet_id != scope.van.fleet_id {
        return Err(Error::validation(
            "The student does not belong to the van's fleet",
        ));
    }
    if !rules::is_valid_boarding_time(input.boarding_time, now) {
        return Err(Error::validation(format!(
            "Boarding must have happened within the last {} days",
            rules::BOARDING_WINDOW_DAYS
        )));
    }
    if !rules::is_valid_dropoff_time(input.boarding_time, input.dropoff_time, now) {
        return Err(Error::validation(format!(
            "Drop-off must follow boarding by at most {} hours and not be in the future",
            rules::MAX_TRIP_HOURS
        )));
    }
    if !rules::is_valid_location(&input.boarding_location)
        || !rules::is_valid_location(&input.dropoff_location)
    {
        return Err(Error::validation("Trip location is out of range"));
    }

    let student_id = scope.student.student_id;
    let existing = ctx
        .uow
        .find::<StudentTripLog>(|log| log.student_id == student_id)
        .await?;
    if rules::has_overlapping_trip(
        &existing,
        student_id,
        input.boarding_time,
        input.dropoff_time,
        exclude,
    ) {
        return Err(Error::validation(
            "The trip overlaps another trip of the student",
        ));
    }
    Ok(())
}

pub struct TripLogHandlers;

impl TripLogHandlers {
    async fn load(ctx: &RequestContext, id: Uuid) -> Result<(StudentTripLog, TripLogScope)> {
        let log = ctx.uow.require::<StudentTripLog>(id).await?;
        let scope = ctx.resolver().trip_log(&log).await?;
        Ok((log, scope))
    }

    fn enforce_student_access(
        ctx: &RequestContext,
        subject: &Subject,
        student: &StudentScope,
    ) -> Result<()> {
        ctx.enforce(
            subject,
            Action::Access,
            ResourceKind::Student,
            Some(student.student_id),
            access::can_access_student(subject, student),
        )
    }
}

#[async_trait]
impl RequestHandler<CreateTripLog> for TripLogHandlers {
    async fn handle(
        &self,
        request: CreateTripLog,
        ctx: &mut RequestContext,
    ) -> Result<StudentTripLog> {
        let subject = ctx.subject().await?;
        let route = ctx.uow.require::<Route>(request.route_id).await?;
        let resolver = ctx.resolver();
        let van = resolver.van_by_id(route.van_id).await?;
        let student = resolver.student_by_id(request.student_id).await?;
        let input = request.trip;
        let log = StudentTripLog {
            id: Uuid::new_v4(),
            student_id: student.student_id,
            route_id: route.id,
            van_id: van.van_id,
            status: TripStatus::Pending,
            boarding_time: input.boarding_time,
            boarding_location: input.boarding_location,
            dropoff_time: input.dropoff_time,
            dropoff_location: input.dropoff_location,
        };
        let scope = TripLogScope {
            trip_log_id: log.id,
            status: log.status,
            van,
            student,
        };
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::StudentTripLog,
            Some(log.id),
            rules::can_manage_trip_log(&subject, &scope),
        )?;
        validate(ctx, &scope, &input, None).await?;

        ctx.uow.add(&log)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            trip_log = %log.id,
            student = %log.student_id,
            van = %log.van_id,
            "Logged trip"
        );
        Ok(log)
    }
}

#[async_trait]
impl RequestHandler<UpdateTripLog> for TripLogHandlers {
    async fn handle(
        &self,
        request: UpdateTripLog,
        ctx: &mut RequestContext,
    ) -> Result<StudentTripLog> {
        let subject = ctx.subject().await?;
        let (mut log, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::StudentTripLog,
            Some(log.id),
            rules::can_manage_trip_log(&subject, &scope),
        )?;
        if log.status.is_terminal() {
            return Err(Error::validation(format!(
                "A {} trip can no longer be edited",
                log.status
            )));
        }
        let input = request.trip;
        validate(ctx, &scope, &input, Some(log.id)).await?;

        log.boarding_time = input.boarding_time;
        log.boarding_location = input.boarding_location;
        log.dropoff_time = input.dropoff_time;
        log.dropoff_location = input.dropoff_location;
        ctx.uow.update(&log)?;
        ctx.save().await?;

        info!(actor = %subject.id(), trip_log = %log.id, "Updated trip log");
        Ok(log)
    }
}

#[async_trait]
impl RequestHandler<ChangeTripStatus> for TripLogHandlers {
    async fn handle(
        &self,
        request: ChangeTripStatus,
        ctx: &mut RequestContext,
    ) -> Result<StudentTripLog> {
        let subject = ctx.subject().await?;
        let (mut log, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::ChangeStatus,
            ResourceKind::StudentTripLog,
            Some(log.id),
            rules::can_manage_trip_log(&subject, &scope),
        )?;
        if !rules::can_change_status(&subject, &scope, request.status) {
            return Err(Error::validation(format!(
                "Cannot move a trip from {} to {}",
                log.status, request.status
            )));
        }

        let from = log.status;
        log.status = request.status;
        ctx.uow.update(&log)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            trip_log = %log.id,
            from = %from,
            to = %log.status,
            "Changed trip status"
        );
        Ok(log)
    }
}

#[async_trait]
impl RequestHandler<DeleteTripLog> for TripLogHandlers {
    async fn handle(&self, request: DeleteTripLog, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let (log, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::StudentTripLog,
            Some(log.id),
            rules::can_delete_trip_log(&subject, &scope),
        )?;

        ctx.uow.delete(&log);
        ctx.save().await?;

        info!(actor = %subject.id(), trip_log = %log.id, "Deleted trip log");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetTripLogById> for TripLogHandlers {
    async fn handle(
        &self,
        request: GetTripLogById,
        ctx: &mut RequestContext,
    ) -> Result<StudentTripLog> {
        let subject = ctx.subject().await?;
        let (log, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::StudentTripLog,
            Some(log.id),
            rules::can_access_trip_log(&subject, &scope),
        )?;
        Ok(log)
    }
}

#[async_trait]
impl RequestHandler<GetTripLogsByStudent> for TripLogHandlers {
    async fn handle(
        &self,
        request: GetTripLogsByStudent,
        ctx: &mut RequestContext,
    ) -> Result<Vec<StudentTripLog>> {
        let subject = ctx.subject().await?;
        let student = ctx.resolver().student_by_id(request.student_id).await?;
        Self::enforce_student_access(ctx, &subject, &student)?;
        let mut logs = ctx
            .uow
            .find::<StudentTripLog>(|log| log.student_id == student.student_id)
            .await?;
        logs.sort_by(|a, b| b.boarding_time.cmp(&a.boarding_time));
        Ok(logs)
    }
}

#[async_trait]
impl RequestHandler<GetTripLogsByVan> for TripLogHandlers {
    async fn handle(
        &self,
        request: GetTripLogsByVan,
        ctx: &mut RequestContext,
    ) -> Result<Vec<StudentTripLog>> {
        let subject = ctx.subject().await?;
        let van = ctx.resolver().van_by_id(request.van_id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Van,
            Some(van.van_id),
            access::can_access_van(&subject, &van),
        )?;
        let mut logs = ctx
            .uow
            .find::<StudentTripLog>(|log| log.van_id == van.van_id)
            .await?;
        logs.sort_by(|a, b| b.boarding_time.cmp(&a.boarding_time));
        Ok(logs)
    }
}

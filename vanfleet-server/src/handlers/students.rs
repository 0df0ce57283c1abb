//! Students and their van seats.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{
    AuthorizedGuardian, Fleet, ParentInvitation, RouteStop, Student, StudentAbsence,
    StudentTripLog, Van,
};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::{StudentScope, VanRef};
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::access;

use super::{Request, RequestContext, RequestHandler, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub van_id: Option<Uuid>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    pub fleet_id: Uuid,
    #[serde(flatten)]
    pub student: StudentInput,
}

#[derive(Debug, Clone)]
pub struct UpdateStudent {
    pub id: Uuid,
    pub student: StudentInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteStudent {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetStudentById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetStudents;

impl Request for CreateStudent {
    type Response = Student;
    const NAME: &'static str = "CreateStudent";
}

impl Request for UpdateStudent {
    type Response = Student;
    const NAME: &'static str = "UpdateStudent";
}

impl Request for DeleteStudent {
    type Response = ();
    const NAME: &'static str = "DeleteStudent";
}

impl Request for GetStudentById {
    type Response = Student;
    const NAME: &'static str = "GetStudentById";
}

impl Request for GetStudents {
    type Response = Vec<Student>;
    const NAME: &'static str = "GetStudents";
}

/// Check the input and resolve the seat it asks for.
async fn validate(
    ctx: &RequestContext,
    fleet_id: Uuid,
    student_id: Uuid,
    input: &StudentInput,
) -> Result<Option<VanRef>> {
    require_text("Full name", &input.full_name)?;
    if input.date_of_birth > ctx.now().date_naive() {
        return Err(Error::validation("Date of birth cannot be in the future"));
    }
    let Some(van_id) = input.van_id else {
        return Ok(None);
    };

    let van = ctx.uow.require::<Van>(van_id).await?;
    if van.fleet_id != fleet_id {
        return Err(Error::validation("The van belongs to another fleet"));
    }
    let seated = ctx
        .uow
        .find::<Student>(|s| s.van_id == Some(van.id) && s.id != student_id && s.is_active)
        .await?
        .len();
    if seated >= van.capacity as usize {
        return Err(Error::validation(format!(
            "Van {} has no free seats",
            van.plate_number
        )));
    }
    Ok(Some(VanRef::from(&van)))
}

fn apply(student: &mut Student, input: StudentInput) {
    student.full_name = input.full_name.trim().to_string();
    student.date_of_birth = input.date_of_birth;
    student.document = input.document;
    student.van_id = input.van_id;
    student.phone_number = input.phone_number;
    student.address = input.address;
    student.email = input.email;
    student.notes = input.notes;
    student.is_active = input.is_active;
}

pub struct StudentHandlers;

impl StudentHandlers {
    async fn load(ctx: &RequestContext, id: Uuid) -> Result<(Student, StudentScope)> {
        let student = ctx.uow.require::<Student>(id).await?;
        let scope = ctx.resolver().student(&student).await?;
        Ok((student, scope))
    }
}

#[async_trait]
impl RequestHandler<CreateStudent> for StudentHandlers {
    async fn handle(&self, request: CreateStudent, ctx: &mut RequestContext) -> Result<Student> {
        let subject = ctx.subject().await?;
        let fleet = ctx.uow.require::<Fleet>(request.fleet_id).await?;
        let now = ctx.now();
        let mut student = Student {
            id: Uuid::new_v4(),
            full_name: String::new(),
            date_of_birth: request.student.date_of_birth,
            document: None,
            is_active: true,
            fleet_id: fleet.id,
            van_id: None,
            guardian_ids: Vec::new(),
            phone_number: None,
            address: None,
            email: None,
            notes: None,
            created_at: now,
            updated_at: None,
        };
        let scope = StudentScope {
            student_id: student.id,
            fleet_id: fleet.id,
            van: None,
            guardian_ids: Vec::new(),
        };
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::Student,
            Some(student.id),
            access::can_manage_student(&subject, &scope),
        )?;
        validate(ctx, fleet.id, student.id, &request.student).await?;

        apply(&mut student, request.student);
        ctx.uow.add(&student)?;
        ctx.save().await?;

        info!(actor = %subject.id(), student = %student.id, fleet = %fleet.id, "Created student");
        Ok(student)
    }
}

#[async_trait]
impl RequestHandler<UpdateStudent> for StudentHandlers {
    async fn handle(&self, request: UpdateStudent, ctx: &mut RequestContext) -> Result<Student> {
        let subject = ctx.subject().await?;
        let (mut student, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::Student,
            Some(student.id),
            access::can_manage_student(&subject, &scope),
        )?;
        validate(ctx, student.fleet_id, student.id, &request.student).await?;

        apply(&mut student, request.student);
        student.updated_at = Some(ctx.now());
        ctx.uow.update(&student)?;
        ctx.save().await?;

        info!(actor = %subject.id(), student = %student.id, "Updated student");
        Ok(student)
    }
}

#[async_trait]
impl RequestHandler<DeleteStudent> for StudentHandlers {
    async fn handle(&self, request: DeleteStudent, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let (student, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::Student,
            Some(student.id),
            access::can_delete_student(&subject, &scope),
        )?;

        // Everything keyed by the student goes with it
        let id = student.id;
        for row in ctx.uow.find::<AuthorizedGuardian>(|g| g.student_id == id).await? {
            ctx.uow.delete(&row);
        }
        for row in ctx.uow.find::<ParentInvitation>(|i| i.student_id == id).await? {
            ctx.uow.delete(&row);
        }
        for row in ctx.uow.find::<StudentAbsence>(|a| a.student_id == id).await? {
            ctx.uow.delete(&row);
        }
        for row in ctx.uow.find::<StudentTripLog>(|t| t.student_id == id).await? {
            ctx.uow.delete(&row);
        }
        for row in ctx.uow.find::<RouteStop>(|s| s.student_id == id).await? {
            ctx.uow.delete(&row);
        }
        ctx.uow.delete(&student);
        let removed = ctx.save().await?;

        info!(actor = %subject.id(), student = %id, rows = removed, "Deleted student");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetStudentById> for StudentHandlers {
    async fn handle(&self, request: GetStudentById, ctx: &mut RequestContext) -> Result<Student> {
        let subject = ctx.subject().await?;
        let (student, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Student,
            Some(student.id),
            access::can_access_student(&subject, &scope),
        )?;
        Ok(student)
    }
}

#[async_trait]
impl RequestHandler<GetStudents> for StudentHandlers {
    async fn handle(&self, _: GetStudents, ctx: &mut RequestContext) -> Result<Vec<Student>> {
        let subject = ctx.subject().await?;
        let vans: HashMap<Uuid, VanRef> = ctx
            .uow
            .get_all::<Van>()
            .await?
            .iter()
            .map(|van| (van.id, VanRef::from(van)))
            .collect();
        let mut students = ctx
            .uow
            .find::<Student>(|student| {
                let scope = StudentScope {
                    student_id: student.id,
                    fleet_id: student.fleet_id,
                    van: student.van_id.and_then(|id| vans.get(&id).copied()),
                    guardian_ids: student.guardian_ids.clone(),
                };
                access::can_access_student(&subject, &scope)
            })
            .await?;
        students.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(students)
    }
}

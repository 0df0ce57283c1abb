//! User administration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{RoleSet, User};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::access;

use super::{Request, RequestContext, RequestHandler, require_text};

/// A user as returned to clients; credentials stay on the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub roles: Vec<String>,
    pub fleet_id: Option<Uuid>,
    pub van_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            phone_number: user.phone_number.clone(),
            roles: user.roles.to_claims(),
            fleet_id: user.fleet_id,
            van_id: user.van_id,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetUsers;

#[derive(Debug, Clone, Deserialize)]
pub struct GetUserById {
    pub id: Uuid,
}

/// Replace a user's roles. Admin only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoles {
    #[serde(default)]
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub full_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Only admins may change activation
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub id: Uuid,
    pub input: UserInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUser {
    pub id: Uuid,
}

impl Request for GetUsers {
    type Response = Vec<UserView>;
    const NAME: &'static str = "GetUsers";
}

impl Request for GetUserById {
    type Response = UserView;
    const NAME: &'static str = "GetUserById";
}

impl Request for AssignRoles {
    type Response = UserView;
    const NAME: &'static str = "AssignRoles";
}

impl Request for UpdateUser {
    type Response = UserView;
    const NAME: &'static str = "UpdateUser";
}

impl Request for DeleteUser {
    type Response = ();
    const NAME: &'static str = "DeleteUser";
}

pub struct UserHandlers;

#[async_trait]
impl RequestHandler<GetUsers> for UserHandlers {
    async fn handle(&self, _: GetUsers, ctx: &mut RequestContext) -> Result<Vec<UserView>> {
        let subject = ctx.subject().await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::User,
            None,
            access::can_list_users(&subject),
        )?;
        let users = ctx.uow.get_all::<User>().await?;
        Ok(users.iter().map(UserView::from).collect())
    }
}

#[async_trait]
impl RequestHandler<GetUserById> for UserHandlers {
    async fn handle(&self, request: GetUserById, ctx: &mut RequestContext) -> Result<UserView> {
        let subject = ctx.subject().await?;
        let user = ctx.uow.require::<User>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::User,
            Some(user.id),
            access::can_access_user(&subject, user.id),
        )?;
        Ok(UserView::from(&user))
    }
}

#[async_trait]
impl RequestHandler<AssignRoles> for UserHandlers {
    async fn handle(&self, request: AssignRoles, ctx: &mut RequestContext) -> Result<UserView> {
        let subject = ctx.subject().await?;
        ctx.enforce(
            &subject,
            Action::AssignRoles,
            ResourceKind::User,
            Some(request.user_id),
            access::can_assign_roles(&subject),
        )?;

        let roles = RoleSet::parse(&request.roles)?;
        if roles.is_empty() {
            return Err(Error::validation("At least one role is required"));
        }
        let mut user = ctx.uow.require::<User>(request.user_id).await?;
        user.roles = roles;
        ctx.uow.update(&user)?;
        ctx.save().await?;

        info!(actor = %subject.id(), user = %user.id, roles = %user.roles, "Assigned roles");
        Ok(UserView::from(&user))
    }
}

#[async_trait]
impl RequestHandler<UpdateUser> for UserHandlers {
    async fn handle(&self, request: UpdateUser, ctx: &mut RequestContext) -> Result<UserView> {
        let subject = ctx.subject().await?;
        let mut user = ctx.uow.require::<User>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::User,
            Some(user.id),
            access::can_update_user(&subject, user.id),
        )?;

        let input = request.input;
        require_text("Full name", &input.full_name)?;
        if let Some(is_active) = input.is_active {
            if is_active != user.is_active && !subject.roles.is_admin() {
                return Err(Error::Forbidden);
            }
            user.is_active = is_active;
        }
        user.full_name = input.full_name.trim().to_string();
        user.phone_number = input.phone_number;
        ctx.uow.update(&user)?;
        ctx.save().await?;

        info!(actor = %subject.id(), user = %user.id, "Updated user");
        Ok(UserView::from(&user))
    }
}

#[async_trait]
impl RequestHandler<DeleteUser> for UserHandlers {
    async fn handle(&self, request: DeleteUser, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let user = ctx.uow.require::<User>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::User,
            Some(user.id),
            access::can_delete_user(&subject, user.id),
        )?;

        ctx.uow.delete(&user);
        ctx.save().await?;

        info!(actor = %subject.id(), user = %user.id, "Deleted user");
        Ok(())
    }
}

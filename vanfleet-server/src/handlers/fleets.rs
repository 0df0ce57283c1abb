//! Fleet commands and queries.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{Fleet, FleetSubscription, User, Van};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::FleetScope;
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::{access, subscription};

use super::{Request, RequestContext, RequestHandler, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFleet {
    pub name: String,
    /// Admins may create a fleet on behalf of an owner
    #[serde(default)]
    pub owner_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetInput {
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct UpdateFleet {
    pub id: Uuid,
    pub input: FleetInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteFleet {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetFleetById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetFleets;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFleetsByOwner {
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFleetsByDriver {
    pub driver_id: Uuid,
}

impl Request for CreateFleet {
    type Response = Fleet;
    const NAME: &'static str = "CreateFleet";
}

impl Request for UpdateFleet {
    type Response = Fleet;
    const NAME: &'static str = "UpdateFleet";
}

impl Request for DeleteFleet {
    type Response = ();
    const NAME: &'static str = "DeleteFleet";
}

impl Request for GetFleetById {
    type Response = Fleet;
    const NAME: &'static str = "GetFleetById";
}

impl Request for GetFleets {
    type Response = Vec<Fleet>;
    const NAME: &'static str = "GetFleets";
}

impl Request for GetFleetsByOwner {
    type Response = Vec<Fleet>;
    const NAME: &'static str = "GetFleetsByOwner";
}

impl Request for GetFleetsByDriver {
    type Response = Vec<Fleet>;
    const NAME: &'static str = "GetFleetsByDriver";
}

pub struct FleetHandlers;

impl FleetHandlers {
    async fn load(ctx: &RequestContext, id: Uuid) -> Result<(Fleet, FleetScope)> {
        let fleet = ctx.uow.require::<Fleet>(id).await?;
        let scope = ctx.resolver().fleet(&fleet).await?;
        Ok((fleet, scope))
    }

    /// Every fleet the caller may see, filtered by `keep`.
    async fn visible(ctx: &RequestContext, keep: impl Fn(&Fleet) -> bool) -> Result<Vec<Fleet>> {
        let subject = ctx.subject().await?;
        let mut visible = Vec::new();
        for fleet in ctx.uow.find::<Fleet>(keep).await? {
            let scope = ctx.resolver().fleet(&fleet).await?;
            if access::can_access_fleet(&subject, &scope) {
                visible.push(fleet);
            }
        }
        visible.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(visible)
    }
}

#[async_trait]
impl RequestHandler<CreateFleet> for FleetHandlers {
    async fn handle(&self, request: CreateFleet, ctx: &mut RequestContext) -> Result<Fleet> {
        let subject = ctx.subject().await?;
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::Fleet,
            None,
            access::can_create_fleet(&subject),
        )?;
        require_text("Fleet name", &request.name)?;

        let owner_id = match request.owner_user_id {
            Some(owner_id) if owner_id != subject.id() => {
                if !subject.roles.is_admin() {
                    return Err(Error::Forbidden);
                }
                owner_id
            }
            _ => subject.id(),
        };
        let mut owner = ctx.uow.require::<User>(owner_id).await?;
        if !owner.roles.is_fleet_owner() {
            return Err(Error::validation("The fleet owner must hold the FleetOwner role"));
        }

        let owned = ctx.uow.find::<Fleet>(|f| f.owner_user_id == owner.id).await?;
        let owned_ids: Vec<Uuid> = owned.iter().map(|f| f.id).collect();
        let subscriptions = ctx
            .uow
            .find::<FleetSubscription>(|s| owned_ids.contains(&s.fleet_id))
            .await?;
        if !subscription::can_create_fleet(&owned, &subscriptions) {
            return Err(Error::validation(
                "Subscribe an existing fleet to a plan before creating another",
            ));
        }

        let now = ctx.now();
        let fleet = Fleet {
            id: Uuid::new_v4(),
            owner_user_id: owner.id,
            name: request.name.trim().to_string(),
            is_active: true,
            created_at: now,
            updated_at: None,
        };
        ctx.uow.add(&fleet)?;
        if owner.fleet_id.is_none() {
            owner.fleet_id = Some(fleet.id);
            ctx.uow.update(&owner)?;
        }
        ctx.save().await?;

        info!(actor = %subject.id(), fleet = %fleet.id, owner = %owner.id, "Created fleet");
        Ok(fleet)
    }
}

#[async_trait]
impl RequestHandler<UpdateFleet> for FleetHandlers {
    async fn handle(&self, request: UpdateFleet, ctx: &mut RequestContext) -> Result<Fleet> {
        let subject = ctx.subject().await?;
        let (mut fleet, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::Fleet,
            Some(fleet.id),
            access::can_manage_fleet(&subject, &scope),
        )?;
        require_text("Fleet name", &request.input.name)?;

        fleet.name = request.input.name.trim().to_string();
        fleet.is_active = request.input.is_active;
        fleet.updated_at = Some(ctx.now());
        ctx.uow.update(&fleet)?;
        ctx.save().await?;

        info!(actor = %subject.id(), fleet = %fleet.id, "Updated fleet");
        Ok(fleet)
    }
}

#[async_trait]
impl RequestHandler<DeleteFleet> for FleetHandlers {
    async fn handle(&self, request: DeleteFleet, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let (fleet, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::Fleet,
            Some(fleet.id),
            access::can_delete_fleet(&subject, &scope),
        )?;
        if !scope.vans.is_empty() {
            return Err(Error::validation("Remove the fleet's vans before deleting it"));
        }

        ctx.uow.delete(&fleet);
        ctx.save().await?;

        info!(actor = %subject.id(), fleet = %fleet.id, "Deleted fleet");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetFleetById> for FleetHandlers {
    async fn handle(&self, request: GetFleetById, ctx: &mut RequestContext) -> Result<Fleet> {
        let subject = ctx.subject().await?;
        let (fleet, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Fleet,
            Some(fleet.id),
            access::can_access_fleet(&subject, &scope),
        )?;
        Ok(fleet)
    }
}

#[async_trait]
impl RequestHandler<GetFleets> for FleetHandlers {
    async fn handle(&self, _: GetFleets, ctx: &mut RequestContext) -> Result<Vec<Fleet>> {
        Self::visible(ctx, |_| true).await
    }
}

#[async_trait]
impl RequestHandler<GetFleetsByOwner> for FleetHandlers {
    async fn handle(
        &self,
        request: GetFleetsByOwner,
        ctx: &mut RequestContext,
    ) -> Result<Vec<Fleet>> {
        let owner_id = request.owner_id;
        Self::visible(ctx, move |fleet| fleet.owner_user_id == owner_id).await
    }
}

#[async_trait]
impl RequestHandler<GetFleetsByDriver> for FleetHandlers {
    async fn handle(
        &self,
        request: GetFleetsByDriver,
        ctx: &mut RequestContext,
    ) -> Result<Vec<Fleet>> {
        let driver_id = request.driver_id;
        let fleet_ids: Vec<Uuid> = ctx
            .uow
            .find::<Van>(|van| van.driver_id == Some(driver_id))
            .await?
            .into_iter()
            .map(|van| van.fleet_id)
            .collect();
        Self::visible(ctx, move |fleet| fleet_ids.contains(&fleet.id)).await
    }
}

//! Routes driven by a van.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{Fleet, Route, RouteStop, Van};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::{RouteScope, VanRef};
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::{access, subscription};

use super::subscriptions::plan_allows;
use super::{Request, RequestContext, RequestHandler, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInput {
    pub van_id: Uuid,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoute {
    #[serde(flatten)]
    pub route: RouteInput,
}

#[derive(Debug, Clone)]
pub struct UpdateRoute {
    pub id: Uuid,
    pub route: RouteInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRoute {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetRouteById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetRoutes;

impl Request for CreateRoute {
    type Response = Route;
    const NAME: &'static str = "CreateRoute";
}

impl Request for UpdateRoute {
    type Response = Route;
    const NAME: &'static str = "UpdateRoute";
}

impl Request for DeleteRoute {
    type Response = ();
    const NAME: &'static str = "DeleteRoute";
}

impl Request for GetRouteById {
    type Response = Route;
    const NAME: &'static str = "GetRouteById";
}

impl Request for GetRoutes {
    type Response = Vec<Route>;
    const NAME: &'static str = "GetRoutes";
}

pub struct RouteHandlers;

impl RouteHandlers {
    async fn load(ctx: &RequestContext, id: Uuid) -> Result<(Route, RouteScope)> {
        let route = ctx.uow.require::<Route>(id).await?;
        let scope = ctx.resolver().route(&route).await?;
        Ok((route, scope))
    }

    /// Routes may only be opened under a running subscription.
    async fn ensure_route_quota(ctx: &RequestContext, van: &Van) -> Result<()> {
        let fleet = ctx.uow.require::<Fleet>(van.fleet_id).await?;
        if !plan_allows(ctx, &fleet, subscription::can_add_route).await? {
            return Err(Error::validation(
                "The fleet's subscription does not allow another route",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<CreateRoute> for RouteHandlers {
    async fn handle(&self, request: CreateRoute, ctx: &mut RequestContext) -> Result<Route> {
        let subject = ctx.subject().await?;
        let input = request.route;
        let van = ctx.uow.require::<Van>(input.van_id).await?;
        let route = Route {
            id: Uuid::new_v4(),
            van_id: van.id,
            description: input.description.trim().to_string(),
        };
        let scope = RouteScope {
            route_id: route.id,
            van: VanRef::from(&van),
        };
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::Route,
            Some(route.id),
            access::can_manage_route(&subject, &scope),
        )?;
        require_text("Description", &route.description)?;
        Self::ensure_route_quota(ctx, &van).await?;

        ctx.uow.add(&route)?;
        ctx.save().await?;

        info!(actor = %subject.id(), route = %route.id, van = %van.id, "Created route");
        Ok(route)
    }
}

#[async_trait]
impl RequestHandler<UpdateRoute> for RouteHandlers {
    async fn handle(&self, request: UpdateRoute, ctx: &mut RequestContext) -> Result<Route> {
        let subject = ctx.subject().await?;
        let (mut route, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::Route,
            Some(route.id),
            access::can_manage_route(&subject, &scope),
        )?;
        let input = request.route;
        require_text("Description", &input.description)?;

        if input.van_id != route.van_id {
            let van = ctx.uow.require::<Van>(input.van_id).await?;
            let moved = RouteScope {
                route_id: route.id,
                van: VanRef::from(&van),
            };
            ctx.enforce(
                &subject,
                Action::Manage,
                ResourceKind::Van,
                Some(van.id),
                access::can_manage_route(&subject, &moved),
            )?;
            route.van_id = van.id;
        }
        route.description = input.description.trim().to_string();
        ctx.uow.update(&route)?;
        ctx.save().await?;

        info!(actor = %subject.id(), route = %route.id, "Updated route");
        Ok(route)
    }
}

#[async_trait]
impl RequestHandler<DeleteRoute> for RouteHandlers {
    async fn handle(&self, request: DeleteRoute, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let (route, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::Route,
            Some(route.id),
            access::can_delete_route(&subject, &scope),
        )?;

        // Stops belong to their route
        let stops = ctx
            .uow
            .find::<RouteStop>(|stop| stop.route_id == route.id)
            .await?;
        for stop in &stops {
            ctx.uow.delete(stop);
        }
        ctx.uow.delete(&route);
        ctx.save().await?;

        info!(actor = %subject.id(), route = %route.id, stops = stops.len(), "Deleted route");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetRouteById> for RouteHandlers {
    async fn handle(&self, request: GetRouteById, ctx: &mut RequestContext) -> Result<Route> {
        let subject = ctx.subject().await?;
        let (route, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Route,
            Some(route.id),
            access::can_access_route(&subject, &scope),
        )?;
        Ok(route)
    }
}

#[async_trait]
impl RequestHandler<GetRoutes> for RouteHandlers {
    async fn handle(&self, _: GetRoutes, ctx: &mut RequestContext) -> Result<Vec<Route>> {
        let subject = ctx.subject().await?;
        let vans: HashMap<Uuid, VanRef> = ctx
            .uow
            .get_all::<Van>()
            .await?
            .iter()
            .map(|van| (van.id, VanRef::from(van)))
            .collect();
        let routes = ctx
            .uow
            .find::<Route>(|route| {
                vans.get(&route.van_id).is_some_and(|van| {
                    let scope = RouteScope {
                        route_id: route.id,
                        van: *van,
                    };
                    access::can_access_route(&subject, &scope)
                })
            })
            .await?;
        Ok(routes)
    }
}

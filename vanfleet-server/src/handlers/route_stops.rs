//! Boarding and drop-off stops along a route.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{GeoPoint, Route, RouteStop, StopKind, Student};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::{RouteScope, RouteStopScope};
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::{access, trip_log};

use super::{Request, RequestContext, RequestHandler};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStopInput {
    pub student_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: StopKind,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteStop {
    pub route_id: Uuid,
    #[serde(flatten)]
    pub stop: RouteStopInput,
}

#[derive(Debug, Clone)]
pub struct UpdateRouteStop {
    pub id: Uuid,
    pub stop: RouteStopInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRouteStop {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetRouteStopById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRouteStops {
    pub route_id: Uuid,
}

impl Request for CreateRouteStop {
    type Response = RouteStop;
    const NAME: &'static str = "CreateRouteStop";
}

impl Request for UpdateRouteStop {
    type Response = RouteStop;
    const NAME: &'static str = "UpdateRouteStop";
}

impl Request for DeleteRouteStop {
    type Response = ();
    const NAME: &'static str = "DeleteRouteStop";
}

impl Request for GetRouteStopById {
    type Response = RouteStop;
    const NAME: &'static str = "GetRouteStopById";
}

impl Request for GetRouteStops {
    type Response = Vec<RouteStop>;
    const NAME: &'static str = "GetRouteStops";
}

/// The stop's student must ride with the fleet that runs the route.
async fn validate(ctx: &RequestContext, route: &RouteScope, input: &RouteStopInput) -> Result<()> {
    if !trip_log::is_valid_location(&input.location) {
        return Err(Error::validation("Stop location is out of range"));
    }
    let student = ctx.uow.require::<Student>(input.student_id).await?;
    if student.fleet_id != route.van.fleet_id {
        return Err(Error::validation(
            "The student does not belong to the route's fleet",
        ));
    }
    Ok(())
}

pub struct RouteStopHandlers;

impl RouteStopHandlers {
    async fn load(ctx: &RequestContext, id: Uuid) -> Result<(RouteStop, RouteStopScope)> {
        let stop = ctx.uow.require::<RouteStop>(id).await?;
        let scope = ctx.resolver().route_stop(&stop).await?;
        Ok((stop, scope))
    }
}

#[async_trait]
impl RequestHandler<CreateRouteStop> for RouteStopHandlers {
    async fn handle(
        &self,
        request: CreateRouteStop,
        ctx: &mut RequestContext,
    ) -> Result<RouteStop> {
        let subject = ctx.subject().await?;
        let route = ctx.uow.require::<Route>(request.route_id).await?;
        let route_scope = ctx.resolver().route(&route).await?;
        let stop = RouteStop {
            id: Uuid::new_v4(),
            route_id: route.id,
            student_id: request.stop.student_id,
            timestamp: request.stop.timestamp,
            kind: request.stop.kind,
            location: request.stop.location,
        };
        let scope = RouteStopScope {
            stop_id: stop.id,
            route: route_scope,
        };
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::RouteStop,
            Some(stop.id),
            access::can_manage_route_stop(&subject, &scope),
        )?;
        validate(ctx, &scope.route, &request.stop).await?;

        ctx.uow.add(&stop)?;
        ctx.save().await?;

        info!(actor = %subject.id(), stop = %stop.id, route = %route.id, "Created route stop");
        Ok(stop)
    }
}

#[async_trait]
impl RequestHandler<UpdateRouteStop> for RouteStopHandlers {
    async fn handle(
        &self,
        request: UpdateRouteStop,
        ctx: &mut RequestContext,
    ) -> Result<RouteStop> {
        let subject = ctx.subject().await?;
        let (mut stop, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::RouteStop,
            Some(stop.id),
            access::can_manage_route_stop(&subject, &scope),
        )?;
        validate(ctx, &scope.route, &request.stop).await?;

        stop.student_id = request.stop.student_id;
        stop.timestamp = request.stop.timestamp;
        stop.kind = request.stop.kind;
        stop.location = request.stop.location;
        ctx.uow.update(&stop)?;
        ctx.save().await?;

        info!(actor = %subject.id(), stop = %stop.id, "Updated route stop");
        Ok(stop)
    }
}

#[async_trait]
impl RequestHandler<DeleteRouteStop> for RouteStopHandlers {
    async fn handle(&self, request: DeleteRouteStop, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let (stop, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::RouteStop,
            Some(stop.id),
            access::can_delete_route_stop(&subject, &scope),
        )?;

        ctx.uow.delete(&stop);
        ctx.save().await?;

        info!(actor = %subject.id(), stop = %stop.id, "Deleted route stop");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetRouteStopById> for RouteStopHandlers {
    async fn handle(
        &self,
        request: GetRouteStopById,
        ctx: &mut RequestContext,
    ) -> Result<RouteStop> {
        let subject = ctx.subject().await?;
        let (stop, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::RouteStop,
            Some(stop.id),
            access::can_access_route_stop(&subject, &scope),
        )?;
        Ok(stop)
    }
}

#[async_trait]
impl RequestHandler<GetRouteStops> for RouteStopHandlers {
    async fn handle(
        &self,
        request: GetRouteStops,
        ctx: &mut RequestContext,
    ) -> Result<Vec<RouteStop>> {
        let subject = ctx.subject().await?;
        let scope = ctx.resolver().route_by_id(request.route_id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Route,
            Some(scope.route_id),
            access::can_access_route(&subject, &scope),
        )?;
        let mut stops = ctx
            .uow
            .find::<RouteStop>(|stop| stop.route_id == scope.route_id)
            .await?;
        stops.sort_by_key(|stop| stop.timestamp);
        Ok(stops)
    }
}

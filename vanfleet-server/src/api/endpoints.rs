//! Generic axum handlers that turn HTTP calls into dispatched requests.
//!
//! Each route names the request type it dispatches, e.g.
//! `get(by_path::<GetVanById>)`. Requests addressed by a path id implement
//! [`PathRequest`]; those that also carry a body implement
//! [`PathBodyRequest`].

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{ApiError, AppState, CurrentUser};
use crate::handlers::{Request, absences, fleets, guardians, invitations, plans, route_stops};
use crate::handlers::{routes, students, subscriptions, trip_logs, users, vans};

/// A request fully described by the id in its path.
pub trait PathRequest: Request {
    fn from_path(id: Uuid) -> Self;
}

/// A request built from a path id and a JSON body.
pub trait PathBodyRequest: Request {
    type Body: DeserializeOwned + Send + 'static;

    fn from_parts(id: Uuid, body: Self::Body) -> Self;
}

type ApiResult<T> = Result<T, ApiError>;

/// `GET` on a collection.
pub async fn list<R>(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Json<R::Response>>
where
    R: Request + Default,
    R::Response: Serialize,
{
    Ok(Json(state.dispatch(Some(session), R::default()).await?))
}

/// A request addressed by its path id alone: a single resource, a
/// collection under a parent, or a bodyless command such as renew.
pub async fn by_path<R>(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<R::Response>>
where
    R: PathRequest,
    R::Response: Serialize,
{
    Ok(Json(state.dispatch(Some(session), R::from_path(id)).await?))
}

/// `DELETE` a resource.
pub async fn remove<R>(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode>
where
    R: PathRequest<Response = ()>,
{
    state.dispatch(Some(session), R::from_path(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST` a new resource.
pub async fn create<R>(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    payload: Result<Json<R>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<R::Response>)>
where
    R: Request + DeserializeOwned,
    R::Response: Serialize,
{
    let Json(request) = payload?;
    let created = state.dispatch(Some(session), request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `POST` a command that is not a creation.
pub async fn command<R>(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    payload: Result<Json<R>, JsonRejection>,
) -> ApiResult<Json<R::Response>>
where
    R: Request + DeserializeOwned,
    R::Response: Serialize,
{
    let Json(request) = payload?;
    Ok(Json(state.dispatch(Some(session), request).await?))
}

/// `PUT`/`POST` against an existing resource.
pub async fn update<R>(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<R::Body>, JsonRejection>,
) -> ApiResult<Json<R::Response>>
where
    R: PathBodyRequest,
    R::Response: Serialize,
{
    let Json(body) = payload?;
    Ok(Json(state.dispatch(Some(session), R::from_parts(id, body)).await?))
}

/// Unauthenticated command, e.g. login.
pub async fn anonymous<R>(
    State(state): State<AppState>,
    payload: Result<Json<R>, JsonRejection>,
) -> ApiResult<Json<R::Response>>
where
    R: Request + DeserializeOwned,
    R::Response: Serialize,
{
    let Json(request) = payload?;
    Ok(Json(state.dispatch(None, request).await?))
}

/// Unauthenticated command with an empty answer.
pub async fn anonymous_empty<R>(
    State(state): State<AppState>,
    payload: Result<Json<R>, JsonRejection>,
) -> ApiResult<StatusCode>
where
    R: Request<Response = ()> + DeserializeOwned,
{
    let Json(request) = payload?;
    state.dispatch(None, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

macro_rules! path_requests {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl PathRequest for $ty {
                fn from_path(id: Uuid) -> Self {
                    Self { $field: id }
                }
            }
        )*
    };
}

macro_rules! update_requests {
    ($($ty:ty { $field:ident: $body:ty }),* $(,)?) => {
        $(
            impl PathBodyRequest for $ty {
                type Body = $body;

                fn from_parts(id: Uuid, body: $body) -> Self {
                    Self { id, $field: body }
                }
            }
        )*
    };
}

path_requests! {
    users::GetUserById => id,
    users::DeleteUser => id,
    fleets::GetFleetById => id,
    fleets::DeleteFleet => id,
    fleets::GetFleetsByOwner => owner_id,
    fleets::GetFleetsByDriver => driver_id,
    vans::GetVanById => id,
    vans::DeleteVan => id,
    routes::GetRouteById => id,
    routes::DeleteRoute => id,
    route_stops::GetRouteStopById => id,
    route_stops::DeleteRouteStop => id,
    route_stops::GetRouteStops => route_id,
    students::GetStudentById => id,
    students::DeleteStudent => id,
    absences::GetAbsenceById => id,
    absences::DeleteAbsence => id,
    absences::ApproveJustification => id,
    absences::GetAbsencesByStudent => student_id,
    trip_logs::GetTripLogById => id,
    trip_logs::DeleteTripLog => id,
    trip_logs::GetTripLogsByStudent => student_id,
    trip_logs::GetTripLogsByVan => van_id,
    guardians::GetGuardianById => id,
    guardians::DeleteGuardian => id,
    guardians::GetGuardiansByStudent => student_id,
    invitations::ResendInvitation => id,
    plans::GetPlanById => id,
    plans::DeletePlan => id,
    subscriptions::RenewSubscription => id,
    subscriptions::DeleteSubscription => id,
    subscriptions::GetSubscriptionsByFleet => fleet_id,
}

update_requests! {
    users::UpdateUser { input: users::UserInput },
    fleets::UpdateFleet { input: fleets::FleetInput },
    vans::UpdateVan { van: vans::VanInput },
    routes::UpdateRoute { route: routes::RouteInput },
    route_stops::UpdateRouteStop { stop: route_stops::RouteStopInput },
    students::UpdateStudent { student: students::StudentInput },
    absences::UpdateAbsence { absence: absences::AbsenceInput },
    trip_logs::UpdateTripLog { trip: trip_logs::TripLogInput },
    guardians::UpdateGuardian { guardian: guardians::GuardianInput },
    plans::UpdatePlan { plan: plans::PlanInput },
}

// Commands whose body is the request itself, addressed by the path id.

impl PathBodyRequest for users::AssignRoles {
    type Body = Self;

    fn from_parts(id: Uuid, mut body: Self) -> Self {
        body.user_id = id;
        body
    }
}

impl PathBodyRequest for absences::JustifyAbsence {
    type Body = Self;

    fn from_parts(id: Uuid, mut body: Self) -> Self {
        body.id = id;
        body
    }
}

impl PathBodyRequest for trip_logs::ChangeTripStatus {
    type Body = Self;

    fn from_parts(id: Uuid, mut body: Self) -> Self {
        body.id = id;
        body
    }
}

impl PathBodyRequest for subscriptions::CancelSubscription {
    type Body = Self;

    fn from_parts(id: Uuid, mut body: Self) -> Self {
        body.id = id;
        body
    }
}

//! HTTP surface.
//!
//! Every route authenticates with a bearer token (except the sign-in
//! family and `/health`), builds a request context and hands the typed
//! request to the [`Dispatcher`]. Errors leave through [`ApiError`].

mod endpoints;
mod error;
mod extract;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::routing::{delete, get, post, put};
use serde_json::{Value, json};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vanfleet_core::Cancellation;
use vanfleet_core::persistence::Store;

pub use endpoints::{PathBodyRequest, PathRequest};
pub use error::{ApiError, ErrorBody};
pub use extract::CurrentUser;

use self::endpoints::{anonymous, anonymous_empty, by_path, command, create, list, remove, update};
use crate::handlers::{
    RequestContext, Services, Session, absences, auth, fleets, guardians, invitations, plans,
    route_stops, routes, students, subscriptions, trip_logs, users, vans,
};
use crate::registry::Dispatcher;

/// Shared by every HTTP request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub services: Arc<Services>,
    pub dispatcher: Arc<Dispatcher>,
    /// Flips to `true` when the server shuts down
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// A fresh context: its own unit of work, cancelled on shutdown.
    pub fn context(&self, session: Option<Session>) -> RequestContext {
        let ctx = RequestContext::new(self.store.clone(), self.services.clone())
            .with_cancellation(Cancellation::from_watch(self.shutdown.clone()));
        match session {
            Some(session) => ctx.with_session(session),
            None => ctx,
        }
    }

    pub async fn dispatch<R: crate::handlers::Request>(
        &self,
        session: Option<Session>,
        request: R,
    ) -> Result<R::Response, ApiError> {
        let mut ctx = self.context(session);
        Ok(self.dispatcher.send(request, &mut ctx).await?)
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the complete application router.
pub fn router(state: AppState) -> Router {
    let auth = Router::new()
        .route("/register", post(anonymous::<auth::Register>))
        .route("/login", post(anonymous::<auth::Login>))
        .route("/refresh-token", post(anonymous::<auth::RefreshToken>))
        .route("/logout", post(anonymous_empty::<auth::Logout>));

    let users = Router::new()
        .route("/", get(list::<users::GetUsers>))
        .route(
            "/:id",
            get(by_path::<users::GetUserById>)
                .put(update::<users::UpdateUser>)
                .delete(remove::<users::DeleteUser>),
        )
        .route("/:id/roles", put(update::<users::AssignRoles>));

    let fleets = Router::new()
        .route(
            "/",
            get(list::<fleets::GetFleets>).post(create::<fleets::CreateFleet>),
        )
        .route(
            "/:id",
            get(by_path::<fleets::GetFleetById>)
                .put(update::<fleets::UpdateFleet>)
                .delete(remove::<fleets::DeleteFleet>),
        )
        .route("/owner/:id", get(by_path::<fleets::GetFleetsByOwner>))
        .route("/driver/:id", get(by_path::<fleets::GetFleetsByDriver>));

    let vans = Router::new()
        .route("/", get(list::<vans::GetVans>).post(create::<vans::CreateVan>))
        .route(
            "/:id",
            get(by_path::<vans::GetVanById>)
                .put(update::<vans::UpdateVan>)
                .delete(remove::<vans::DeleteVan>),
        );

    let routes = Router::new()
        .route(
            "/",
            get(list::<routes::GetRoutes>).post(create::<routes::CreateRoute>),
        )
        .route(
            "/:id",
            get(by_path::<routes::GetRouteById>)
                .put(update::<routes::UpdateRoute>)
                .delete(remove::<routes::DeleteRoute>),
        );

    let route_stops = Router::new()
        .route("/", post(create::<route_stops::CreateRouteStop>))
        .route(
            "/:id",
            get(by_path::<route_stops::GetRouteStopById>)
                .put(update::<route_stops::UpdateRouteStop>)
                .delete(remove::<route_stops::DeleteRouteStop>),
        )
        .route("/route/:id", get(by_path::<route_stops::GetRouteStops>));

    let students = Router::new()
        .route(
            "/",
            get(list::<students::GetStudents>).post(create::<students::CreateStudent>),
        )
        .route(
            "/:id",
            get(by_path::<students::GetStudentById>)
                .put(update::<students::UpdateStudent>)
                .delete(remove::<students::DeleteStudent>),
        );

    let absences = Router::new()
        .route("/", post(create::<absences::CreateAbsence>))
        .route(
            "/:id",
            get(by_path::<absences::GetAbsenceById>)
                .put(update::<absences::UpdateAbsence>)
                .delete(remove::<absences::DeleteAbsence>),
        )
        .route("/:id/justify", post(update::<absences::JustifyAbsence>))
        .route("/:id/approve", post(by_path::<absences::ApproveJustification>))
        .route("/student/:id", get(by_path::<absences::GetAbsencesByStudent>));

    let trip_logs = Router::new()
        .route("/", post(create::<trip_logs::CreateTripLog>))
        .route(
            "/:id",
            get(by_path::<trip_logs::GetTripLogById>)
                .put(update::<trip_logs::UpdateTripLog>)
                .delete(remove::<trip_logs::DeleteTripLog>),
        )
        .route("/:id/status", put(update::<trip_logs::ChangeTripStatus>))
        .route("/student/:id", get(by_path::<trip_logs::GetTripLogsByStudent>))
        .route("/van/:id", get(by_path::<trip_logs::GetTripLogsByVan>));

    let guardians = Router::new()
        .route("/", post(create::<guardians::CreateGuardian>))
        .route(
            "/:id",
            get(by_path::<guardians::GetGuardianById>)
                .put(update::<guardians::UpdateGuardian>)
                .delete(remove::<guardians::DeleteGuardian>),
        )
        .route("/student/:id", get(by_path::<guardians::GetGuardiansByStudent>));

    let invitations = Router::new()
        .route("/", post(create::<invitations::CreateInvitation>))
        .route("/accept", post(command::<invitations::AcceptInvitation>))
        .route("/remove-parent", post(command::<invitations::RemoveParent>))
        .route("/:id/resend", post(by_path::<invitations::ResendInvitation>));

    let plans = Router::new()
        .route("/", get(list::<plans::GetPlans>).post(create::<plans::CreatePlan>))
        .route(
            "/:id",
            get(by_path::<plans::GetPlanById>)
                .put(update::<plans::UpdatePlan>)
                .delete(remove::<plans::DeletePlan>),
        );

    let subscriptions = Router::new()
        .route("/", post(create::<subscriptions::Subscribe>))
        .route("/:id", delete(remove::<subscriptions::DeleteSubscription>))
        .route("/:id/renew", post(by_path::<subscriptions::RenewSubscription>))
        .route("/:id/cancel", post(update::<subscriptions::CancelSubscription>))
        .route(
            "/fleet/:id",
            get(by_path::<subscriptions::GetSubscriptionsByFleet>),
        );

    let api = Router::new()
        .nest("/auth", auth)
        .nest("/users", users)
        .nest("/fleets", fleets)
        .nest("/vans", vans)
        .nest("/routes", routes)
        .nest("/route-stops", route_stops)
        .nest("/students", students)
        .nest("/student-absences", absences)
        .nest("/student-trip-logs", trip_logs)
        .nest("/authorized-guardians", guardians)
        .nest("/parent-invitations", invitations)
        .nest("/plans", plans)
        .nest("/fleet-subscriptions", subscriptions);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;
    use vanfleet_core::session::JwtSettings;

    use crate::builder::ServerBuilder;

    fn app() -> axum::Router {
        ServerBuilder::new()
            .with_jwt(JwtSettings {
                secret: "api-tests-secret-0123456789abcdefgh".into(),
                ..JwtSettings::default()
            })
            .with_password_cost(4)
            .build()
            .unwrap()
            .router()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_token() {
        let response = app()
            .oneshot(Request::get("/api/vans").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app()
            .oneshot(
                Request::get("/api/vans")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_validation_error() {
        let response = app()
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"email\": 42"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

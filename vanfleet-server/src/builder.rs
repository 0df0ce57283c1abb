//! Builder pattern for assembling a VanFleet server.
//!
//! The builder wires the persistence store, the session services, the
//! access guard and the dispatcher with every command and query handler
//! registered.
//!
//! # Examples
//!
//! ```rust
//! use vanfleet_server::prelude::*;
//!
//! let server = ServerBuilder::new()
//!     .with_jwt(JwtSettings {
//!         secret: "a-development-secret-of-32-bytes!!".into(),
//!         ..JwtSettings::default()
//!     })
//!     .with_bind_address("127.0.0.1", 0)
//!     .build()
//!     .unwrap();
//! assert_eq!(server.address(), "127.0.0.1:0");
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use vanfleet_core::persistence::{MemoryStore, Store};
use vanfleet_core::session::{IdentityService, JwtSettings, TokenService};
use vanfleet_core::{Clock, Error, Result, SystemClock};
use vanfleet_rbac::AccessGuard;
use vanfleet_rbac::config::RbacConfig;

use crate::api::AppState;
use crate::config::AppConfig;
use crate::handlers::absences::AbsenceHandlers;
use crate::handlers::auth::AuthHandlers;
use crate::handlers::fleets::FleetHandlers;
use crate::handlers::guardians::GuardianHandlers;
use crate::handlers::invitations::InvitationHandlers;
use crate::handlers::plans::PlanHandlers;
use crate::handlers::route_stops::RouteStopHandlers;
use crate::handlers::routes::RouteHandlers;
use crate::handlers::students::StudentHandlers;
use crate::handlers::subscriptions::SubscriptionHandlers;
use crate::handlers::trip_logs::TripLogHandlers;
use crate::handlers::users::UserHandlers;
use crate::handlers::vans::VanHandlers;
use crate::handlers::{
    Services, absences, auth, fleets, guardians, invitations, plans, route_stops, routes,
    students, subscriptions, trip_logs, users, vans,
};
use crate::middleware::{LoggingMiddleware, Middleware};
use crate::registry::Dispatcher;
use crate::server::VanFleetServer;

/// Builder for [`VanFleetServer`] with a fluent API.
pub struct ServerBuilder {
    jwt: Option<JwtSettings>,
    rbac: RbacConfig,
    store: Option<Arc<dyn Store>>,
    clock: Option<Arc<dyn Clock>>,
    password_cost: Option<u32>,
    middleware_stack: Vec<Arc<dyn Middleware>>,
    request_logging: bool,
    bind_address: String,
    port: u16,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            jwt: None,
            rbac: RbacConfig::default(),
            store: None,
            clock: None,
            password_cost: None,
            middleware_stack: Vec::new(),
            request_logging: true,
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }

    /// Start from loaded application settings.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new()
            .with_jwt(config.jwt.clone())
            .with_rbac(config.rbac.clone())
            .with_bind_address(config.server.bind_address.clone(), config.server.port)
    }

    /// Token signing settings. Required.
    pub fn with_jwt(mut self, settings: JwtSettings) -> Self {
        self.jwt = Some(settings);
        self
    }

    pub fn with_rbac(mut self, config: RbacConfig) -> Self {
        self.rbac = config;
        self
    }

    /// Use an existing store instead of a fresh in-memory one.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// bcrypt work factor for new passwords
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = Some(cost);
        self
    }

    /// Add middleware around every dispatched request.
    pub fn with_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middleware_stack.push(Arc::new(middleware));
        self
    }

    /// Drop the default request logging middleware.
    pub fn without_request_logging(mut self) -> Self {
        self.request_logging = false;
        self
    }

    pub fn with_bind_address(mut self, address: impl Into<String>, port: u16) -> Self {
        self.bind_address = address.into();
        self.port = port;
        self
    }

    pub fn build(self) -> Result<VanFleetServer> {
        let settings = self
            .jwt
            .ok_or_else(|| Error::configuration("JWT settings are required"))?;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store: Arc<dyn Store> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let tokens = TokenService::new(settings, clock.clone())?;
        let mut identity = IdentityService::new(clock.clone());
        if let Some(cost) = self.password_cost {
            identity = identity.with_cost(cost);
        }
        let services = Services {
            tokens,
            identity,
            guard: AccessGuard::from_config(&self.rbac),
            clock,
        };

        let mut dispatcher = Dispatcher::new();
        register_handlers(&mut dispatcher);
        if self.request_logging {
            dispatcher.add_middleware(Arc::new(LoggingMiddleware::new()));
        }
        for middleware in self.middleware_stack {
            dispatcher.add_middleware(middleware);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState {
            store,
            services: Arc::new(services),
            dispatcher: Arc::new(dispatcher),
            shutdown: shutdown_rx,
        };
        Ok(VanFleetServer::new(
            state,
            shutdown_tx,
            self.bind_address,
            self.port,
        ))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the handler of every command and query.
pub fn register_handlers(dispatcher: &mut Dispatcher) {
    dispatcher
        .register::<auth::Register, _>(AuthHandlers)
        .register::<auth::Login, _>(AuthHandlers)
        .register::<auth::RefreshToken, _>(AuthHandlers)
        .register::<auth::Logout, _>(AuthHandlers);

    dispatcher
        .register::<users::GetUsers, _>(UserHandlers)
        .register::<users::GetUserById, _>(UserHandlers)
        .register::<users::AssignRoles, _>(UserHandlers)
        .register::<users::UpdateUser, _>(UserHandlers)
        .register::<users::DeleteUser, _>(UserHandlers);

    dispatcher
        .register::<fleets::CreateFleet, _>(FleetHandlers)
        .register::<fleets::UpdateFleet, _>(FleetHandlers)
        .register::<fleets::DeleteFleet, _>(FleetHandlers)
        .register::<fleets::GetFleetById, _>(FleetHandlers)
        .register::<fleets::GetFleets, _>(FleetHandlers)
        .register::<fleets::GetFleetsByOwner, _>(FleetHandlers)
        .register::<fleets::GetFleetsByDriver, _>(FleetHandlers);

    dispatcher
        .register::<vans::CreateVan, _>(VanHandlers)
        .register::<vans::UpdateVan, _>(VanHandlers)
        .register::<vans::DeleteVan, _>(VanHandlers)
        .register::<vans::GetVanById, _>(VanHandlers)
        .register::<vans::GetVans, _>(VanHandlers);

    dispatcher
        .register::<routes::CreateRoute, _>(RouteHandlers)
        .register::<routes::UpdateRoute, _>(RouteHandlers)
        .register::<routes::DeleteRoute, _>(RouteHandlers)
        .register::<routes::GetRouteById, _>(RouteHandlers)
        .register::<routes::GetRoutes, _>(RouteHandlers);

    dispatcher
        .register::<route_stops::CreateRouteStop, _>(RouteStopHandlers)
        .register::<route_stops::UpdateRouteStop, _>(RouteStopHandlers)
        .register::<route_stops::DeleteRouteStop, _>(RouteStopHandlers)
        .register::<route_stops::GetRouteStopById, _>(RouteStopHandlers)
        .register::<route_stops::GetRouteStops, _>(RouteStopHandlers);

    dispatcher
        .register::<students::CreateStudent, _>(StudentHandlers)
        .register::<students::UpdateStudent, _>(StudentHandlers)
        .register::<students::DeleteStudent, _>(StudentHandlers)
        .register::<students::GetStudentById, _>(StudentHandlers)
        .register::<students::GetStudents, _>(StudentHandlers);

    dispatcher
        .register::<absences::CreateAbsence, _>(AbsenceHandlers)
        .register::<absences::UpdateAbsence, _>(AbsenceHandlers)
        .register::<absences::DeleteAbsence, _>(AbsenceHandlers)
        .register::<absences::JustifyAbsence, _>(AbsenceHandlers)
        .register::<absences::ApproveJustification, _>(AbsenceHandlers)
        .register::<absences::GetAbsenceById, _>(AbsenceHandlers)
        .register::<absences::GetAbsencesByStudent, _>(AbsenceHandlers);

    dispatcher
        .register::<trip_logs::CreateTripLog, _>(TripLogHandlers)
        .register::<trip_logs::UpdateTripLog, _>(TripLogHandlers)
        .register::<trip_logs::ChangeTripStatus, _>(TripLogHandlers)
        .register::<trip_logs::DeleteTripLog, _>(TripLogHandlers)
        .register::<trip_logs::GetTripLogById, _>(TripLogHandlers)
        .register::<trip_logs::GetTripLogsByStudent, _>(TripLogHandlers)
        .register::<trip_logs::GetTripLogsByVan, _>(TripLogHandlers);

    dispatcher
        .register::<guardians::CreateGuardian, _>(GuardianHandlers)
        .register::<guardians::UpdateGuardian, _>(GuardianHandlers)
        .register::<guardians::DeleteGuardian, _>(GuardianHandlers)
        .register::<guardians::GetGuardianById, _>(GuardianHandlers)
        .register::<guardians::GetGuardiansByStudent, _>(GuardianHandlers);

    dispatcher
        .register::<invitations::CreateInvitation, _>(InvitationHandlers)
        .register::<invitations::AcceptInvitation, _>(InvitationHandlers)
        .register::<invitations::ResendInvitation, _>(InvitationHandlers)
        .register::<invitations::RemoveParent, _>(InvitationHandlers);

    dispatcher
        .register::<plans::CreatePlan, _>(PlanHandlers)
        .register::<plans::UpdatePlan, _>(PlanHandlers)
        .register::<plans::DeletePlan, _>(PlanHandlers)
        .register::<plans::GetPlanById, _>(PlanHandlers)
        .register::<plans::GetPlans, _>(PlanHandlers);

    dispatcher
        .register::<subscriptions::Subscribe, _>(SubscriptionHandlers)
        .register::<subscriptions::RenewSubscription, _>(SubscriptionHandlers)
        .register::<subscriptions::CancelSubscription, _>(SubscriptionHandlers)
        .register::<subscriptions::DeleteSubscription, _>(SubscriptionHandlers)
        .register::<subscriptions::GetSubscriptionsByFleet, _>(SubscriptionHandlers);
}

//! Commands and queries driven through the dispatcher of a fully built
//! server, the way the HTTP layer drives them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;
use vanfleet::core::persistence::UnitOfWork;
use vanfleet::core::session::{JwtSettings, NewUser};
use vanfleet::core::types::{BillingCycle, Fleet, Role, RoleSet, User};
use vanfleet::core::{Cancellation, Clock, Error, FixedClock, Result};
use vanfleet::server::VanFleetServer;
use vanfleet::server::handlers::auth::{AuthResponse, Login, Register};
use vanfleet::server::handlers::fleets::{CreateFleet, DeleteFleet, GetFleetById, GetFleets};
use vanfleet::server::handlers::plans::{CreatePlan, GetPlans, PlanInput};
use vanfleet::server::handlers::subscriptions::{CancelSubscription, Subscribe};
use vanfleet::server::handlers::vans::{CreateVan, GetVans, VanInput};
use vanfleet::server::handlers::Session;
use vanfleet::server::middleware::{Middleware, RequestInfo};

#[derive(Default)]
struct Counts {
    started: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

struct CountingMiddleware(Arc<Counts>);

#[async_trait]
impl Middleware for CountingMiddleware {
    async fn before_request(&self, _: &RequestInfo) -> Result<()> {
        self.0.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn after_response(&self, _: &RequestInfo) -> Result<()> {
        self.0.succeeded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_error(&self, _: &RequestInfo, _: &Error) -> Result<()> {
        self.0.failed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct App {
    server: VanFleetServer,
    clock: Arc<FixedClock>,
    counts: Arc<Counts>,
}

impl App {
    fn new() -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 9, 8, 0, 0).unwrap(),
        ));
        let counts = Arc::new(Counts::default());
        let server = VanFleetServer::builder()
            .with_jwt(JwtSettings {
                secret: "dispatch-tests-secret-0123456789abcdef".into(),
                ..JwtSettings::default()
            })
            .with_clock(clock.clone())
            .with_password_cost(4)
            .with_middleware(CountingMiddleware(counts.clone()))
            .build()
            .unwrap();
        Self {
            server,
            clock,
            counts,
        }
    }

    async fn send<R: vanfleet::server::handlers::Request>(
        &self,
        session: Option<&Session>,
        request: R,
    ) -> std::result::Result<R::Response, Error> {
        self.server
            .state()
            .dispatch(session.cloned(), request)
            .await
            .map_err(|err| err.0)
    }

    /// Seed a user directly; there is no public way to mint an admin.
    async fn seed(&self, email: &str, roles: RoleSet) -> Session {
        let state = self.server.state();
        let mut uow = UnitOfWork::new(state.store.clone());
        let user: User = state
            .services
            .identity
            .create_user(
                &mut uow,
                NewUser {
                    email: email.into(),
                    password: "Adm1n$secret".into(),
                    full_name: "Seeded User".into(),
                    phone_number: None,
                    roles: roles.clone(),
                },
            )
            .await
            .unwrap();
        uow.save_changes(&Cancellation::none()).await.unwrap();
        Session {
            user_id: user.id,
            roles,
        }
    }

    /// Sign up through the dispatcher and read the session back from the
    /// issued access token.
    async fn register(&self, email: &str) -> Session {
        let auth: AuthResponse = self
            .send(
                None,
                Register {
                    email: email.into(),
                    password: "Fl33t$owner".into(),
                    full_name: "Olga Owner".into(),
                    phone_number: Some("+55 11 99999-0000".into()),
                },
            )
            .await
            .unwrap();
        let claims = self
            .server
            .state()
            .services
            .tokens
            .validate_access_token(&auth.tokens.access_token)
            .unwrap();
        Session {
            user_id: claims.sub,
            roles: claims.roles().unwrap(),
        }
    }

    async fn plan(&self, admin: &Session, max_vans: u32) -> Uuid {
        self.send(
            Some(admin),
            CreatePlan {
                plan: PlanInput {
                    name: "Starter".into(),
                    description: None,
                    price: 199.9,
                    currency: "brl".into(),
                    billing_cycle: BillingCycle::Monthly,
                    duration_in_months: 1,
                    max_vans,
                    is_default: true,
                    is_active: true,
                },
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn fleet(&self, owner: &Session, name: &str) -> Fleet {
        self.send(
            Some(owner),
            CreateFleet {
                name: name.into(),
                owner_user_id: None,
            },
        )
        .await
        .unwrap()
    }

    async fn subscribe(&self, owner: &Session, fleet_id: Uuid, plan_id: Uuid) -> Uuid {
        self.send(
            Some(owner),
            Subscribe {
                fleet_id,
                plan_id,
                payment_method: Some("PIX".into()),
                transaction_id: None,
                notes: None,
            },
        )
        .await
        .unwrap()
        .id
    }
}

fn van(plate: &str) -> VanInput {
    VanInput {
        plate_number: plate.into(),
        model: Some("Sprinter".into()),
        brand: Some("Mercedes".into()),
        capacity: 15,
        driver_id: None,
        is_active: true,
    }
}

#[tokio::test]
async fn test_owner_onboarding_and_van_quota() {
    let app = App::new();
    let admin = app.seed("root@vanfleet.test", RoleSet::only(Role::Admin)).await;
    let plan_id = app.plan(&admin, 1).await;

    let owner = app.register("Olga@Fleet.test").await;
    assert_eq!(owner.roles, RoleSet::only(Role::FleetOwner));
    let fleet = app.fleet(&owner, "  Rota Escolar  ").await;
    assert_eq!(fleet.name, "Rota Escolar");
    assert_eq!(fleet.owner_user_id, owner.user_id);

    // No subscription yet, so no vans.
    let err = app
        .send(
            Some(&owner),
            CreateVan {
                fleet_id: fleet.id,
                van: van("abc1d23"),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    app.subscribe(&owner, fleet.id, plan_id).await;
    let created = app
        .send(
            Some(&owner),
            CreateVan {
                fleet_id: fleet.id,
                van: van("abc1d23"),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.plate_number, "ABC1D23");
    assert_eq!(created.fleet_id, fleet.id);

    // The plan holds one van.
    let err = app
        .send(
            Some(&owner),
            CreateVan {
                fleet_id: fleet.id,
                van: van("XYZ9K88"),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let vans = app.send(Some(&owner), GetVans).await.unwrap();
    assert_eq!(vans.len(), 1);
}

#[tokio::test]
async fn test_second_fleet_needs_a_subscription() {
    let app = App::new();
    let admin = app.seed("root@vanfleet.test", RoleSet::only(Role::Admin)).await;
    let plan_id = app.plan(&admin, 3).await;
    let owner = app.register("owner@fleet.test").await;

    let first = app.fleet(&owner, "North").await;
    let err = app
        .send(
            Some(&owner),
            CreateFleet {
                name: "South".into(),
                owner_user_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    app.subscribe(&owner, first.id, plan_id).await;
    app.fleet(&owner, "South").await;

    let fleets = app.send(Some(&owner), GetFleets).await.unwrap();
    let names: Vec<_> = fleets.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["North", "South"]);
}

#[tokio::test]
async fn test_double_subscription_is_rejected_until_cancelled() {
    let app = App::new();
    let admin = app.seed("root@vanfleet.test", RoleSet::only(Role::Admin)).await;
    let plan_id = app.plan(&admin, 2).await;
    let owner = app.register("owner@fleet.test").await;
    let fleet = app.fleet(&owner, "Downtown").await;

    let subscription_id = app.subscribe(&owner, fleet.id, plan_id).await;
    let err = app
        .send(
            Some(&owner),
            Subscribe {
                fleet_id: fleet.id,
                plan_id,
                payment_method: None,
                transaction_id: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let cancelled = app
        .send(
            Some(&owner),
            CancelSubscription {
                id: subscription_id,
                reason: Some("Switching plans".into()),
            },
        )
        .await
        .unwrap();
    assert!(!cancelled.is_active);
    assert_eq!(cancelled.cancelled_at, Some(app.clock.now()));

    app.subscribe(&owner, fleet.id, plan_id).await;
}

#[tokio::test]
async fn test_subscription_lapses_with_time() {
    let app = App::new();
    let admin = app.seed("root@vanfleet.test", RoleSet::only(Role::Admin)).await;
    let plan_id = app.plan(&admin, 5).await;
    let owner = app.register("owner@fleet.test").await;
    let fleet = app.fleet(&owner, "Lapsing").await;
    app.subscribe(&owner, fleet.id, plan_id).await;

    app.clock.advance(Duration::days(40));
    let err = app
        .send(
            Some(&owner),
            CreateVan {
                fleet_id: fleet.id,
                van: van("LAP5E00"),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_tenants_cannot_see_each_other() {
    let app = App::new();
    let ours = app.register("ours@fleet.test").await;
    let theirs = app.register("theirs@fleet.test").await;
    let fleet = app.fleet(&ours, "Ours").await;

    let err = app
        .send(Some(&theirs), GetFleetById { id: fleet.id })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
    assert!(app.send(Some(&theirs), GetFleets).await.unwrap().is_empty());

    let err = app
        .send(Some(&theirs), DeleteFleet { id: fleet.id })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
    assert_ok_fleet(&app, &ours, fleet.id).await;
}

async fn assert_ok_fleet(app: &App, session: &Session, id: Uuid) {
    let fleet = app.send(Some(session), GetFleetById { id }).await.unwrap();
    assert_eq!(fleet.id, id);
}

#[tokio::test]
async fn test_missing_entities_and_missing_sessions() {
    let app = App::new();
    let owner = app.register("owner@fleet.test").await;

    let err = app
        .send(Some(&owner), GetFleetById { id: Uuid::new_v4() })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.status_code(), 404);

    let err = app.send(None, GetPlans).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
}

#[tokio::test]
async fn test_only_admins_manage_plans() {
    let app = App::new();
    let owner = app.register("owner@fleet.test").await;
    let err = app
        .send(
            Some(&owner),
            CreatePlan {
                plan: PlanInput {
                    name: "Free".into(),
                    description: None,
                    price: 0.0,
                    currency: "BRL".into(),
                    billing_cycle: BillingCycle::Monthly,
                    duration_in_months: 1,
                    max_vans: 1,
                    is_default: false,
                    is_active: true,
                },
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = App::new();
    app.register("owner@fleet.test").await;

    let err = app
        .send(
            None,
            Login {
                email: "owner@fleet.test".into(),
                password: "Wr0ng$password".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    let auth = app
        .send(
            None,
            Login {
                email: "OWNER@fleet.test".into(),
                password: "Fl33t$owner".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(auth.user.last_login_at, Some(app.clock.now()));
}

#[tokio::test]
async fn test_middleware_sees_every_outcome() {
    let app = App::new();
    let owner = app.register("owner@fleet.test").await;
    app.fleet(&owner, "Counted").await;
    app.send(Some(&owner), GetFleetById { id: Uuid::new_v4() })
        .await
        .unwrap_err();

    assert_eq!(app.counts.started.load(Ordering::SeqCst), 3);
    assert_eq!(app.counts.succeeded.load(Ordering::SeqCst), 2);
    assert_eq!(app.counts.failed.load(Ordering::SeqCst), 1);
}

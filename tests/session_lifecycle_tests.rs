//! Access and refresh token lifecycle against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};
use vanfleet::core::persistence::{MemoryStore, Store, UnitOfWork};
use vanfleet::core::session::{IdentityService, JwtSettings, NewUser, TokenService};
use vanfleet::core::types::{Role, RoleSet, User};
use vanfleet::core::{Cancellation, Error, FixedClock};

const SECRET: &str = "session-tests-secret-0123456789abcdef";

struct Fixture {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    tokens: TokenService,
    identity: IdentityService,
}

impl Fixture {
    fn new() -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 2, 2, 7, 0, 0).unwrap(),
        ));
        let settings = JwtSettings {
            secret: SECRET.into(),
            ..JwtSettings::default()
        };
        Self {
            store: Arc::new(MemoryStore::new()),
            tokens: TokenService::new(settings, clock.clone()).unwrap(),
            identity: IdentityService::new(clock.clone()).with_cost(4),
            clock,
        }
    }

    fn uow(&self) -> UnitOfWork {
        let store: Arc<dyn Store> = self.store.clone();
        UnitOfWork::new(store)
    }

    async fn user(&self, roles: RoleSet) -> User {
        let mut uow = self.uow();
        let user = self
            .identity
            .create_user(
                &mut uow,
                NewUser {
                    email: "Driver@Fleet.test".into(),
                    password: "Fl33t$driver".into(),
                    full_name: "Dora Driver".into(),
                    phone_number: None,
                    roles,
                },
            )
            .await
            .unwrap();
        uow.save_changes(&Cancellation::none()).await.unwrap();
        user
    }
}

#[tokio::test]
async fn test_access_token_carries_identity_and_roles() {
    let fx = Fixture::new();
    let user = fx.user(RoleSet::only(Role::Driver).with(Role::Parent)).await;

    let pair = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &Cancellation::none())
        .await
        .unwrap();
    assert_eq!(pair.expires_in, 3600);

    let claims = fx.tokens.validate_access_token(&pair.access_token).unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.email, "driver@fleet.test");
    assert_eq!(claims.full_name, "Dora Driver");
    assert_eq!(claims.roles().unwrap(), user.roles);
    assert_eq!(claims.iss, "vanfleet");
    assert_eq!(claims.aud, "vanfleet-clients");
}

#[tokio::test]
async fn test_access_token_expires() {
    let fx = Fixture::new();
    let user = fx.user(RoleSet::only(Role::FleetOwner)).await;
    let pair = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &Cancellation::none())
        .await
        .unwrap();

    fx.clock.advance(Duration::minutes(59));
    assert_ok!(fx.tokens.validate_access_token(&pair.access_token));
    fx.clock.advance(Duration::minutes(2));
    let err = assert_err!(fx.tokens.validate_access_token(&pair.access_token));
    assert!(matches!(err, Error::Unauthorized(_)));
}

#[tokio::test]
async fn test_tokens_from_another_secret_are_rejected() {
    let fx = Fixture::new();
    let user = fx.user(RoleSet::only(Role::FleetOwner)).await;
    let pair = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &Cancellation::none())
        .await
        .unwrap();

    let rotated = TokenService::new(
        JwtSettings {
            secret: "a-completely-different-secret-value!".into(),
            ..JwtSettings::default()
        },
        fx.clock.clone(),
    )
    .unwrap();
    let err = assert_err!(rotated.validate_access_token(&pair.access_token));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn test_refresh_rotates_and_old_token_dies() {
    let fx = Fixture::new();
    let user = fx.user(RoleSet::only(Role::Driver)).await;
    let first = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &Cancellation::none())
        .await
        .unwrap();

    let second = fx
        .tokens
        .refresh_tokens(&mut fx.uow(), &first.refresh_token, &Cancellation::none())
        .await
        .unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);
    assert_eq!(fx.store.count("RefreshToken").await, 1);

    let err = fx
        .tokens
        .refresh_tokens(&mut fx.uow(), &first.refresh_token, &Cancellation::none())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));

    assert_ok!(
        fx.tokens
            .refresh_tokens(&mut fx.uow(), &second.refresh_token, &Cancellation::none())
            .await
    );
}

#[tokio::test]
async fn test_expired_refresh_token_is_forbidden() {
    let fx = Fixture::new();
    let user = fx.user(RoleSet::only(Role::Parent)).await;
    let pair = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &Cancellation::none())
        .await
        .unwrap();

    fx.clock.advance(Duration::days(7));
    let err = fx
        .tokens
        .refresh_tokens(&mut fx.uow(), &pair.refresh_token, &Cancellation::none())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
}

#[tokio::test]
async fn test_unknown_refresh_token_is_forbidden() {
    let fx = Fixture::new();
    let err = fx
        .tokens
        .refresh_tokens(&mut fx.uow(), "bm90LWEtdG9rZW4=", &Cancellation::none())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
}

#[tokio::test]
async fn test_revoke_is_idempotent() {
    let fx = Fixture::new();
    let user = fx.user(RoleSet::only(Role::Driver)).await;
    let pair = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &Cancellation::none())
        .await
        .unwrap();

    for _ in 0..2 {
        assert_ok!(
            fx.tokens
                .revoke_token(&mut fx.uow(), &pair.refresh_token, &Cancellation::none())
                .await
        );
    }
    assert_eq!(fx.store.count("RefreshToken").await, 0);

    let err = fx
        .tokens
        .refresh_tokens(&mut fx.uow(), &pair.refresh_token, &Cancellation::none())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
}

#[tokio::test]
async fn test_concurrent_refresh_has_one_winner() {
    let fx = Fixture::new();
    let user = fx.user(RoleSet::only(Role::Driver)).await;
    let pair = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &Cancellation::none())
        .await
        .unwrap();

    let mut left = fx.uow();
    let mut right = fx.uow();
    let none = Cancellation::none();
    let (a, b) = futures::join!(
        fx.tokens.refresh_tokens(&mut left, &pair.refresh_token, &none),
        fx.tokens.refresh_tokens(&mut right, &pair.refresh_token, &none),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(Error::Forbidden)))
    );
    assert_eq!(fx.store.count("RefreshToken").await, 1);
}

#[tokio::test]
async fn test_cancelled_request_commits_nothing() {
    let fx = Fixture::new();
    let user = fx.user(RoleSet::only(Role::Driver)).await;
    let (source, cancel) = Cancellation::pair();
    source.cancel();

    let err = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(fx.store.count("RefreshToken").await, 0);
}

#[tokio::test]
async fn test_inactive_user_cannot_refresh() {
    let fx = Fixture::new();
    let mut user = fx.user(RoleSet::only(Role::Driver)).await;
    let pair = fx
        .tokens
        .issue_tokens(&mut fx.uow(), user.id, &Cancellation::none())
        .await
        .unwrap();

    user.is_active = false;
    let mut uow = fx.uow();
    uow.update(&user).unwrap();
    uow.save_changes(&Cancellation::none()).await.unwrap();

    let err = fx
        .tokens
        .refresh_tokens(&mut fx.uow(), &pair.refresh_token, &Cancellation::none())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
}

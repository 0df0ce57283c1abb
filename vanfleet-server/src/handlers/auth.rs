//! Registration, login, refresh and logout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vanfleet_core::session::{NewUser, TokenPair};
use vanfleet_core::types::{Role, RoleSet};
use vanfleet_core::{Error, Result};

use super::users::UserView;
use super::{Request, RequestContext, RequestHandler};

/// Self-service sign-up. New accounts own fleets.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logout {
    pub refresh_token: String,
}

/// A session for a freshly authenticated user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserView,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

impl Request for Register {
    type Response = AuthResponse;
    const NAME: &'static str = "Register";
}

impl Request for Login {
    type Response = AuthResponse;
    const NAME: &'static str = "Login";
}

impl Request for RefreshToken {
    type Response = TokenPair;
    const NAME: &'static str = "RefreshToken";
}

impl Request for Logout {
    type Response = ();
    const NAME: &'static str = "Logout";
}

pub struct AuthHandlers;

#[async_trait]
impl RequestHandler<Register> for AuthHandlers {
    async fn handle(&self, request: Register, ctx: &mut RequestContext) -> Result<AuthResponse> {
        let services = ctx.services.clone();
        let user = services
            .identity
            .create_user(
                &mut ctx.uow,
                NewUser {
                    email: request.email,
                    password: request.password,
                    full_name: request.full_name,
                    phone_number: request.phone_number,
                    roles: RoleSet::only(Role::FleetOwner),
                },
            )
            .await?;
        let tokens = services
            .tokens
            .issue_tokens(&mut ctx.uow, user.id, &ctx.cancel)
            .await?;

        info!(user = %user.id, email = %user.email, "Welcome e-mail queued");
        Ok(AuthResponse {
            user: UserView::from(&user),
            tokens,
        })
    }
}

#[async_trait]
impl RequestHandler<Login> for AuthHandlers {
    async fn handle(&self, request: Login, ctx: &mut RequestContext) -> Result<AuthResponse> {
        let services = ctx.services.clone();
        let Some(mut user) = services
            .identity
            .validate_credentials(&ctx.uow, &request.email, &request.password)
            .await?
        else {
            warn!("Login rejected");
            return Err(Error::unauthorized("Invalid e-mail or password"));
        };

        user.last_login_at = Some(ctx.now());
        ctx.uow.update(&user)?;
        let tokens = services
            .tokens
            .issue_tokens(&mut ctx.uow, user.id, &ctx.cancel)
            .await?;

        info!(user = %user.id, "User logged in");
        Ok(AuthResponse {
            user: UserView::from(&user),
            tokens,
        })
    }
}

#[async_trait]
impl RequestHandler<RefreshToken> for AuthHandlers {
    async fn handle(&self, request: RefreshToken, ctx: &mut RequestContext) -> Result<TokenPair> {
        let services = ctx.services.clone();
        services
            .tokens
            .refresh_tokens(&mut ctx.uow, &request.refresh_token, &ctx.cancel)
            .await
    }
}

#[async_trait]
impl RequestHandler<Logout> for AuthHandlers {
    async fn handle(&self, request: Logout, ctx: &mut RequestContext) -> Result<()> {
        let services = ctx.services.clone();
        services
            .tokens
            .revoke_token(&mut ctx.uow, &request.refresh_token, &ctx.cancel)
            .await
    }
}

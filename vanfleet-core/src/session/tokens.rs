//! Access and refresh tokens.
//!
//! Access tokens are HS256-signed JWTs validated by signature, issuer,
//! audience and expiry alone; they are never stored. Refresh tokens are
//! opaque random strings stored one row per token. Presenting a refresh
//! token deletes its row and stores a replacement in the same batch, so a
//! token works at most once.

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::generate_refresh_token;
use crate::cancellation::Cancellation;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::persistence::UnitOfWork;
use crate::types::{RefreshToken, RoleSet, User};

/// Minimum length of the HMAC signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Token signing and lifetime settings, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// HMAC-SHA256 signing secret
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Access token lifetime
    pub expiry_minutes: i64,
    /// Refresh token lifetime
    pub refresh_token_expiry_days: i64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "vanfleet".to_string(),
            audience: "vanfleet-clients".to_string(),
            expiry_minutes: 60,
            refresh_token_expiry_days: 7,
        }
    }
}

impl JwtSettings {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(Error::configuration(format!(
                "jwt.secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.issuer.trim().is_empty() {
            return Err(Error::configuration("jwt.issuer must not be empty"));
        }
        if self.audience.trim().is_empty() {
            return Err(Error::configuration("jwt.audience must not be empty"));
        }
        if self.expiry_minutes <= 0 {
            return Err(Error::configuration("jwt.expiry_minutes must be positive"));
        }
        if self.refresh_token_expiry_days <= 0 {
            return Err(Error::configuration(
                "jwt.refresh_token_expiry_days must be positive",
            ));
        }
        Ok(())
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: Uuid,
    /// Login name
    pub name: String,
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    /// One entry per role
    #[serde(default)]
    pub role: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token
    pub jti: Uuid,
}

impl AccessClaims {
    /// Parse the role claims. An unknown label invalidates the whole token.
    pub fn roles(&self) -> Result<RoleSet> {
        RoleSet::parse(&self.role)
            .map_err(|_| Error::unauthorized("Access token carries an unknown role"))
    }
}

/// An access token and the refresh token that can replace it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issues, rotates and revokes session credentials.
pub struct TokenService {
    settings: JwtSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Build the service, failing on settings that cannot sign tokens.
    pub fn new(settings: JwtSettings, clock: Arc<dyn Clock>) -> Result<Self> {
        settings.validate()?;
        let encoding_key = EncodingKey::from_secret(settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(settings.secret.as_bytes());
        Ok(Self {
            settings,
            encoding_key,
            decoding_key,
            clock,
        })
    }

    pub fn settings(&self) -> &JwtSettings {
        &self.settings
    }

    /// Mint an access token for a user and store a fresh refresh token.
    pub async fn issue_tokens(
        &self,
        uow: &mut UnitOfWork,
        user_id: Uuid,
        cancel: &Cancellation,
    ) -> Result<TokenPair> {
        let user = uow.require::<User>(user_id).await?;
        let pair = self.stage_pair(uow, &user)?;
        uow.save_changes(cancel).await?;

        info!(user = %user.id, "Issued session tokens");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, invalidating the old token.
    ///
    /// Unknown, expired and already-rotated tokens all fail with the same
    /// [`Error::Forbidden`].
    pub async fn refresh_tokens(
        &self,
        uow: &mut UnitOfWork,
        presented: &str,
        cancel: &Cancellation,
    ) -> Result<TokenPair> {
        let now = self.clock.now();
        let stored = uow
            .find::<RefreshToken>(|row| row.token == presented)
            .await?
            .into_iter()
            .next();

        let Some(stored) = stored.filter(|row| row.is_active(now)) else {
            warn!("Refresh rejected: token unknown or expired");
            return Err(Error::Forbidden);
        };

        let user = match uow.get_by_id::<User>(stored.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                warn!(user = %stored.user_id, "Refresh rejected: user missing or inactive");
                return Err(Error::Forbidden);
            }
        };

        uow.delete(&stored);
        let pair = self.stage_pair(uow, &user)?;
        match uow.save_changes(cancel).await {
            Ok(_) => {}
            Err(Error::Conflict(_)) => {
                warn!(user = %user.id, "Refresh rejected: token already rotated");
                uow.discard_changes();
                return Err(Error::Forbidden);
            }
            Err(err) => return Err(err),
        }

        info!(user = %user.id, "Rotated refresh token");
        Ok(pair)
    }

    /// Delete a refresh token if it exists. Revoking twice is not an error.
    pub async fn revoke_token(
        &self,
        uow: &mut UnitOfWork,
        token: &str,
        cancel: &Cancellation,
    ) -> Result<()> {
        let rows = uow.find::<RefreshToken>(|row| row.token == token).await?;
        if rows.is_empty() {
            debug!("Revoke ignored: token not found");
            return Ok(());
        }
        for row in &rows {
            uow.delete(row);
        }
        match uow.save_changes(cancel).await {
            Ok(_) | Err(Error::Conflict(_)) => {
                uow.discard_changes();
                info!(user = %rows[0].user_id, "Revoked refresh token");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Check an access token and return its claims.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.settings.issuer]);
        validation.set_audience(&[&self.settings.audience]);
        // Expiry is checked against the service clock below.
        validation.validate_exp = false;

        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "Access token rejected");
            Error::unauthorized("Invalid access token")
        })?;

        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(Error::unauthorized("Access token expired"));
        }
        Ok(data.claims)
    }

    fn stage_pair(&self, uow: &mut UnitOfWork, user: &User) -> Result<TokenPair> {
        let now = self.clock.now();
        let access_token = self.mint_access_token(user)?;

        let refresh = RefreshToken {
            id: Uuid::new_v4(),
            token: generate_refresh_token(),
            user_id: user.id,
            expires_at: now + Duration::days(self.settings.refresh_token_expiry_days),
            created_at: now,
        };
        uow.add(&refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh.token,
            expires_in: self.settings.expiry_minutes * 60,
        })
    }

    fn mint_access_token(&self, user: &User) -> Result<String> {
        let now = self.clock.now();
        let claims = AccessClaims {
            sub: user.id,
            name: user.user_name.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.roles.to_claims(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.settings.expiry_minutes)).timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("Failed to sign access token: {e}")))
    }
}

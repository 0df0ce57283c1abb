//! Credential provider: user records and password checks.

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::persistence::UnitOfWork;
use crate::types::{RoleSet, User};

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub roles: RoleSet,
}

/// Stores users and verifies their passwords with bcrypt.
pub struct IdentityService {
    clock: Arc<dyn Clock>,
    cost: u32,
}

impl IdentityService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt work factor.
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Stage a new user. The caller commits with `save_changes`.
    ///
    /// The e-mail doubles as the login name and must be unique.
    pub async fn create_user(&self, uow: &mut UnitOfWork, new: NewUser) -> Result<User> {
        let email = normalize_email(&new.email)?;
        check_password_policy(&new.password)?;
        if new.full_name.trim().is_empty() {
            return Err(Error::validation("Full name is required"));
        }
        if self.find_by_email(uow, &email).await?.is_some() {
            return Err(Error::conflict(format!("E-mail {email} is already registered")));
        }

        let user = User {
            id: Uuid::new_v4(),
            user_name: email.clone(),
            email,
            full_name: new.full_name.trim().to_string(),
            phone_number: new.phone_number,
            password_hash: self.hash_password(&new.password)?,
            roles: new.roles,
            fleet_id: None,
            van_id: None,
            is_active: true,
            created_at: self.clock.now(),
            last_login_at: None,
        };
        uow.add(&user)?;

        info!(user = %user.id, roles = %user.roles, "Created user");
        Ok(user)
    }

    /// Look a user up by e-mail, case-insensitively.
    pub async fn find_by_email(&self, uow: &UnitOfWork, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(uow
            .find::<User>(|user| user.email == email)
            .await?
            .into_iter()
            .next())
    }

    /// Return the user when the e-mail and password match an active account.
    ///
    /// Unknown e-mail, wrong password and inactive account are not told
    /// apart.
    pub async fn validate_credentials(
        &self,
        uow: &UnitOfWork,
        email: &str,
        password: &str,
    ) -> Result<Option<User>> {
        let Some(user) = self.find_by_email(uow, email).await? else {
            debug!("Credential check failed: unknown e-mail");
            return Ok(None);
        };
        if !user.is_active || !self.verify_password(password, &user.password_hash)? {
            debug!(user = %user.id, "Credential check failed");
            return Ok(None);
        }
        Ok(Some(user))
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| Error::internal(format!("Failed to hash password: {e}")))
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        match bcrypt::verify(password, hash) {
            Ok(valid) => Ok(valid),
            Err(bcrypt::BcryptError::InvalidHash(_)) => Ok(false),
            Err(e) => Err(Error::internal(format!("Failed to verify password: {e}"))),
        }
    }
}

/// Trim and lowercase an e-mail, rejecting obviously malformed input.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(Error::validation("A valid e-mail address is required"));
    }
    Ok(email)
}

/// At least eight characters with a digit, a lowercase letter, an uppercase
/// letter and a symbol.
pub fn check_password_policy(password: &str) -> Result<()> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let lower = password.chars().any(|c| c.is_lowercase());
    let upper = password.chars().any(|c| c.is_uppercase());
    let symbol = password.chars().any(|c| !c.is_alphanumeric());
    if long_enough && digit && lower && upper && symbol {
        Ok(())
    } else {
        Err(Error::validation(
            "Password must have at least 8 characters including a digit, an uppercase letter, a lowercase letter and a symbol",
        ))
    }
}

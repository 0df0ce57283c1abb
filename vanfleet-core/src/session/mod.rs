//! Session lifecycle
//!
//! [`TokenService`] mints short-lived signed access tokens and long-lived
//! rotating refresh tokens. [`IdentityService`] stores users and checks
//! their passwords. Both work through the request's
//! [`UnitOfWork`](crate::persistence::UnitOfWork).

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;

pub mod identity;
pub mod tokens;

pub use identity::{IdentityService, NewUser};
pub use tokens::{AccessClaims, JwtSettings, TokenPair, TokenService};

/// Bytes of entropy in a refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Bytes of entropy in an invitation token.
pub const INVITATION_TOKEN_BYTES: usize = 32;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// A fresh refresh token: 64 random bytes, standard base64.
pub fn generate_refresh_token() -> String {
    STANDARD.encode(random_bytes(REFRESH_TOKEN_BYTES))
}

/// A fresh invitation token: 32 random bytes, URL-safe base64 without padding.
pub fn generate_invitation_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(INVITATION_TOKEN_BYTES))
}

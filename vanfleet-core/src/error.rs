//! Error types for VanFleet.
//!
//! Every command, query and session operation reports failures through the
//! [`Error`] enum defined here. The variants mirror the outcomes the HTTP
//! boundary distinguishes, so the server only has to map a variant onto a
//! status code.
//!
//! # Error Handling Philosophy
//!
//! Authorization predicates never fail; they answer `true` or `false`.
//! Handlers translate a `false` into [`Error::Forbidden`], which carries no
//! reason so callers cannot learn which check rejected them.
//!
//! # Examples
//!
//! ```rust
//! use vanfleet_core::error::{Error, Result};
//!
//! fn find_van() -> Result<String> {
//!     Err(Error::not_found("Van", "0b9c6f4e-2f0a-4b55-9a55-1f4a0f3f8b11"))
//! }
//! ```

use thiserror::Error;

/// Result type alias for VanFleet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for VanFleet operations.
///
/// # HTTP Mapping
///
/// - `NotFound` → 404
/// - `Forbidden` → 403
/// - `Unauthorized` → 401
/// - `Validation` → 400
/// - `Conflict` → 409
/// - everything else → 500
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced entity does not exist.
    #[error("{entity} ({id}) was not found")]
    NotFound {
        /// Entity kind, e.g. `Van`.
        entity: String,
        /// Identifier that failed to resolve.
        id: String,
    },

    /// The acting user is not allowed to perform the operation, or a
    /// presented refresh token is missing, expired or already rotated.
    #[error("Access denied")]
    Forbidden,

    /// No authenticated actor could be resolved for the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Input violates a domain invariant.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store rejected a change because the row changed underneath it.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request was cancelled before its changes were committed.
    #[error("Request cancelled")]
    Cancelled,

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Catch-all for other error types.
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a not found error for an entity kind and id.
    ///
    /// ```rust
    /// use vanfleet_core::error::Error;
    ///
    /// let error = Error::not_found("Student", 42);
    /// assert_eq!(error.to_string(), "Student (42) was not found");
    /// ```
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new unauthorized error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a new validation error.
    ///
    /// ```rust
    /// use vanfleet_core::error::Error;
    ///
    /// let error = Error::validation("Latitude must be between -90 and 90");
    /// assert!(error.is_client_error());
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short, stable name of the error kind, used in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Forbidden => "forbidden",
            Self::Unauthorized(_) => "unauthorized",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Configuration(_) => "configuration",
            Self::Cancelled => "cancelled",
            Self::Serialization(_) | Self::Internal(_) | Self::Other(_) => "internal",
        }
    }

    /// HTTP status code the boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Forbidden => 403,
            Self::Unauthorized(_) => 401,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::Cancelled => 499,
            Self::Configuration(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::Other(_) => 500,
        }
    }

    /// Check if this is a client-side error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Forbidden
                | Self::Unauthorized(_)
                | Self::Validation(_)
                | Self::Conflict(_)
        )
    }

    /// Message safe to show to the caller.
    ///
    /// Forbidden never explains itself and server-side failures are
    /// reduced to a fixed text.
    pub fn public_message(&self) -> String {
        match self {
            Self::Forbidden => "You do not have permission to perform this action".to_string(),
            Self::Configuration(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::Other(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

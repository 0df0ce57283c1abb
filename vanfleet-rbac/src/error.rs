//! Error types for VanFleet RBAC

use thiserror::Error;
use vanfleet_core::Error as CoreError;

/// Errors that can occur while preparing an access decision.
///
/// Decisions themselves never fail; these cover missing inputs.
#[derive(Error, Debug)]
pub enum RbacError {
    #[error("Missing reference: {entity} ({id})")]
    MissingReference { entity: &'static str, id: String },

    #[error("Unknown actor: {0}")]
    UnknownActor(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<RbacError> for CoreError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::MissingReference { entity, id } => CoreError::not_found(entity, id),
            RbacError::UnknownActor(id) => {
                CoreError::unauthorized(format!("No user matches the session ({id})"))
            }
            RbacError::Configuration(msg) => CoreError::configuration(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_into_core_error() {
        let missing: CoreError = RbacError::MissingReference {
            entity: "Van",
            id: "42".into(),
        }
        .into();
        assert_eq!(missing.status_code(), 404);

        let unknown: CoreError = RbacError::UnknownActor("7".into()).into();
        assert_eq!(unknown.status_code(), 401);
    }
}

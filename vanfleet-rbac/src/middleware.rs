//! Audited access guard.
//!
//! Handlers evaluate a rule from [`crate::rules`] and hand the boolean to the
//! guard together with who asked for what. The guard records the decision
//! and turns a denial into [`vanfleet_core::Error::Forbidden`].

use tracing::{info, warn};
use vanfleet_core::{Error, Result};

use crate::config::RbacConfig;
use crate::permissions::{Action, ResourceRef};
use crate::subjects::Subject;

/// Records and enforces access decisions.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    audit_enabled: bool,
}

impl AccessGuard {
    /// Create a new guard builder
    pub fn builder() -> AccessGuardBuilder {
        AccessGuardBuilder::new()
    }

    pub fn from_config(config: &RbacConfig) -> Self {
        Self::builder()
            .with_audit_logging(config.audit_enabled)
            .build()
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit_enabled
    }

    /// Record a decision and return it unchanged.
    pub fn check(
        &self,
        subject: &Subject,
        action: Action,
        resource: &ResourceRef,
        allowed: bool,
    ) -> bool {
        if self.audit_enabled {
            if allowed {
                info!(
                    subject = %subject,
                    roles = %subject.roles,
                    action = %action,
                    resource = %resource,
                    result = "granted",
                    "Permission check"
                );
            } else {
                warn!(
                    subject = %subject,
                    roles = %subject.roles,
                    action = %action,
                    resource = %resource,
                    result = "denied",
                    "Permission check"
                );
            }
        }
        allowed
    }

    /// Record a decision and fail with `Forbidden` on denial.
    pub fn enforce(
        &self,
        subject: &Subject,
        action: Action,
        resource: &ResourceRef,
        allowed: bool,
    ) -> Result<()> {
        if self.check(subject, action, resource, allowed) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self::from_config(&RbacConfig::default())
    }
}

/// Builder for [`AccessGuard`]
#[derive(Debug)]
pub struct AccessGuardBuilder {
    audit_enabled: bool,
}

impl AccessGuardBuilder {
    pub fn new() -> Self {
        Self {
            audit_enabled: false,
        }
    }

    /// Enable audit logging
    pub fn with_audit_logging(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    pub fn build(self) -> AccessGuard {
        AccessGuard {
            audit_enabled: self.audit_enabled,
        }
    }
}

impl Default for AccessGuardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

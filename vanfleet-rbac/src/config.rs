//! Configuration types for VanFleet RBAC

use serde::{Deserialize, Serialize};

/// Access guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    /// Write an audit line for every decision
    pub audit_enabled: bool,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self { audit_enabled: true }
    }
}

impl RbacConfig {
    /// A quiet configuration for development and tests.
    pub fn development() -> Self {
        Self {
            audit_enabled: false,
        }
    }
}

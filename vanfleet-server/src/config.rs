//! Application configuration.
//!
//! Settings are read once at startup: an optional TOML or JSON file first,
//! then environment variables prefixed `VANFLEET` with `__` between
//! sections, e.g. `VANFLEET__JWT__SECRET` or `VANFLEET__SERVER__PORT`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vanfleet_core::session::JwtSettings;
use vanfleet_core::{Error, Result};
use vanfleet_rbac::config::RbacConfig;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "VANFLEET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            json: false,
            filter: "vanfleet=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub jwt: JwtSettings,
    pub logging: LoggingSettings,
    pub rbac: RbacConfig,
}

impl AppConfig {
    /// Layer the optional file under the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| Error::configuration(e.to_string()))?;
        settings
            .try_deserialize()
            .map_err(|e| Error::configuration(e.to_string()))
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.trim().is_empty() {
            return Err(Error::configuration("server.bind_address must not be empty"));
        }
        self.jwt.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SECRET: &str = "config-tests-secret-0123456789abcdef";

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.address(), "127.0.0.1:8080");
        assert_eq!(config.jwt.expiry_minutes, 60);
        assert_eq!(config.jwt.refresh_token_expiry_days, 7);
        assert!(config.rbac.audit_enabled);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[jwt]
secret = "{SECRET}"
expiry_minutes = 15

[logging]
json = true
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.jwt.expiry_minutes, 15);
        assert_eq!(config.jwt.issuer, "vanfleet");
        assert!(config.logging.json);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"jwt": {{"secret": "{SECRET}", "audience": "parents-app"}}, "rbac": {{"audit_enabled": false}}}}"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.jwt.audience, "parents-app");
        assert!(!config.rbac.audit_enabled);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}

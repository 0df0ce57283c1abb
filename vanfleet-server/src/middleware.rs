//! Middleware wrapped around every dispatched request

use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;
use vanfleet_core::{Error, Result};

/// What middleware sees of a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo {
    /// Type name of the command or query
    pub name: &'static str,
    /// Acting user, when the request is authenticated
    pub actor: Option<Uuid>,
    pub started: Instant,
}

impl RequestInfo {
    pub fn new(name: &'static str, actor: Option<Uuid>) -> Self {
        Self {
            name,
            actor,
            started: Instant::now(),
        }
    }
}

/// Middleware trait for processing requests
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Runs before the handler. An error aborts the request.
    async fn before_request(&self, request: &RequestInfo) -> Result<()>;

    /// Runs after the handler succeeded
    async fn after_response(&self, request: &RequestInfo) -> Result<()>;

    /// Runs after the handler failed
    async fn on_error(&self, request: &RequestInfo, error: &Error) -> Result<()>;
}

/// Logging middleware
pub struct LoggingMiddleware {
    pub log_timing: bool,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self { log_timing: true }
    }

    pub fn with_timing(mut self, enabled: bool) -> Self {
        self.log_timing = enabled;
        self
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn before_request(&self, request: &RequestInfo) -> Result<()> {
        info!(actor = ?request.actor, "[START] {}", request.name);
        Ok(())
    }

    async fn after_response(&self, request: &RequestInfo) -> Result<()> {
        if self.log_timing {
            info!(
                elapsed_ms = request.started.elapsed().as_millis() as u64,
                "[END] {} completed successfully", request.name
            );
        } else {
            info!("[END] {} completed successfully", request.name);
        }
        Ok(())
    }

    async fn on_error(&self, request: &RequestInfo, error: &Error) -> Result<()> {
        error!(
            actor = ?request.actor,
            kind = error.kind(),
            "[ERROR] {} failed with error: {}", request.name, error
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_middleware_never_fails() {
        let middleware = LoggingMiddleware::new().with_timing(false);
        let info = RequestInfo::new("GetVanById", Some(Uuid::new_v4()));

        assert!(middleware.before_request(&info).await.is_ok());
        assert!(middleware.after_response(&info).await.is_ok());
        assert!(middleware.on_error(&info, &Error::Forbidden).await.is_ok());
    }
}

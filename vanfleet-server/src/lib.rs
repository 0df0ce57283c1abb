//! # VanFleet Server
//!
//! Command dispatch, handlers and the HTTP surface of the VanFleet
//! backend.
//!
//! Every operation is a typed request with exactly one handler, dispatched
//! through a [`Dispatcher`] wrapped in logging middleware. The HTTP layer
//! authenticates bearer tokens, builds a request context and turns core
//! errors into status codes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vanfleet_server::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None)?;
//!     config.validate()?;
//!
//!     let server = ServerBuilder::from_config(&config).build()?;
//!     server.run().await
//! }
//! ```

pub mod api;
pub mod builder;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod registry;
pub mod server;

pub use builder::*;
pub use registry::*;
pub use server::*;

/// Common imports for working with the server
pub mod prelude {
    pub use crate::api::{ApiError, AppState, CurrentUser};
    pub use crate::builder::*;
    pub use crate::config::AppConfig;
    pub use crate::handlers::{Request, RequestContext, RequestHandler, Services, Session};
    pub use crate::middleware::{LoggingMiddleware, Middleware, RequestInfo};
    pub use crate::registry::*;
    pub use crate::server::*;
    pub use vanfleet_core::prelude::*;

    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
}

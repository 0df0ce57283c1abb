//! Command and query handlers.
//!
//! Every operation is a typed request with exactly one handler. Mutating
//! handlers share one shape: resolve the acting user, load the target,
//! resolve its ownership scope, ask the access guard, validate, mutate and
//! commit through the request's unit of work.

pub mod absences;
pub mod auth;
pub mod fleets;
pub mod guardians;
pub mod invitations;
pub mod plans;
pub mod route_stops;
pub mod routes;
pub mod students;
pub mod subscriptions;
pub mod trip_logs;
pub mod users;
pub mod vans;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vanfleet_core::persistence::{Store, UnitOfWork};
use vanfleet_core::session::{IdentityService, TokenService};
use vanfleet_core::types::RoleSet;
use vanfleet_core::{Cancellation, Clock, Error, Result};
use vanfleet_rbac::context::ScopeResolver;
use vanfleet_rbac::permissions::{Action, ResourceKind, ResourceRef};
use vanfleet_rbac::subjects::Subject;
use vanfleet_rbac::AccessGuard;

/// A typed command or query.
pub trait Request: Send + 'static {
    type Response: Send + 'static;

    /// Name used in logs
    const NAME: &'static str;
}

/// Handles one request type.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, request: R, ctx: &mut RequestContext) -> Result<R::Response>;
}

/// Long-lived services shared by every request.
pub struct Services {
    pub tokens: TokenService,
    pub identity: IdentityService,
    pub guard: AccessGuard,
    pub clock: Arc<dyn Clock>,
}

/// The authenticated caller as read from a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub roles: RoleSet,
}

/// State owned by one request: its unit of work, caller and cancellation.
pub struct RequestContext {
    pub uow: UnitOfWork,
    pub services: Arc<Services>,
    pub session: Option<Session>,
    pub cancel: Cancellation,
}

impl RequestContext {
    pub fn new(store: Arc<dyn Store>, services: Arc<Services>) -> Self {
        Self {
            uow: UnitOfWork::new(store),
            services,
            session: None,
            cancel: Cancellation::none(),
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.services.clock.now()
    }

    pub fn actor_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|session| session.user_id)
    }

    pub fn resolver(&self) -> ScopeResolver<'_> {
        ScopeResolver::new(&self.uow)
    }

    /// Resolve the caller into a subject, or fail with `Unauthorized`.
    pub async fn subject(&self) -> Result<Subject> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::unauthorized("Authentication required"))?;
        self.resolver()
            .subject(session.user_id, session.roles.clone())
            .await
    }

    /// Record a decision and fail with `Forbidden` on denial.
    pub fn enforce(
        &self,
        subject: &Subject,
        action: Action,
        kind: ResourceKind,
        id: Option<Uuid>,
        allowed: bool,
    ) -> Result<()> {
        let resource = match id {
            Some(id) => ResourceRef::new(kind, id),
            None => ResourceRef::collection(kind),
        };
        self.services.guard.enforce(subject, action, &resource, allowed)
    }

    /// Commit the staged changes.
    pub async fn save(&mut self) -> Result<usize> {
        self.uow.save_changes(&self.cancel).await
    }
}

/// Reject blank required text fields.
pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(())
}

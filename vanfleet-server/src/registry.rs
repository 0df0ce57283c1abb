//! Registry mapping request types to their handlers

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use vanfleet_core::{Error, Result};

use crate::handlers::{Request, RequestContext, RequestHandler};
use crate::middleware::{Middleware, RequestInfo};

/// Routes each request to the single handler registered for its type.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    middleware_stack: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `R`, replacing any earlier one.
    pub fn register<R, H>(&mut self, handler: H) -> &mut Self
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        let handler: Arc<dyn RequestHandler<R>> = Arc::new(handler);
        self.handlers.insert(TypeId::of::<R>(), Box::new(handler));
        self
    }

    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware_stack.push(Arc::new(middleware));
        self
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware_stack.push(middleware);
    }

    pub fn is_registered<R: Request>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<R>())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `R` inside the middleware stack.
    pub async fn send<R: Request>(
        &self,
        request: R,
        ctx: &mut RequestContext,
    ) -> Result<R::Response> {
        let handler = self
            .handlers
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn RequestHandler<R>>>())
            .cloned()
            .ok_or_else(|| Error::internal(format!("No handler registered for {}", R::NAME)))?;

        let info = RequestInfo::new(R::NAME, ctx.actor_id());
        for middleware in &self.middleware_stack {
            middleware.before_request(&info).await?;
        }

        match handler.handle(request, ctx).await {
            Ok(response) => {
                for middleware in &self.middleware_stack {
                    middleware.after_response(&info).await?;
                }
                Ok(response)
            }
            Err(err) => {
                for middleware in &self.middleware_stack {
                    middleware.on_error(&info, &err).await?;
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::handlers::testing::Harness;

    struct Ping;

    impl Request for Ping {
        type Response = &'static str;
        const NAME: &'static str = "Ping";
    }

    struct Fail;

    impl Request for Fail {
        type Response = ();
        const NAME: &'static str = "Fail";
    }

    struct PingHandler;

    #[async_trait]
    impl RequestHandler<Ping> for PingHandler {
        async fn handle(&self, _: Ping, _: &mut RequestContext) -> Result<&'static str> {
            Ok("pong")
        }
    }

    #[async_trait]
    impl RequestHandler<Fail> for PingHandler {
        async fn handle(&self, _: Fail, _: &mut RequestContext) -> Result<()> {
            Err(Error::Forbidden)
        }
    }

    #[derive(Default)]
    struct Counting {
        before: AtomicUsize,
        after: AtomicUsize,
        errors: AtomicUsize,
    }

    #[async_trait]
    impl Middleware for Arc<Counting> {
        async fn before_request(&self, _: &RequestInfo) -> Result<()> {
            self.before.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn after_response(&self, _: &RequestInfo) -> Result<()> {
            self.after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_error(&self, _: &RequestInfo, _: &Error) -> Result<()> {
            self.errors.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_runs_middleware() {
        let counting = Arc::new(Counting::default());
        let mut dispatcher = Dispatcher::new().with_middleware(counting.clone());
        dispatcher
            .register::<Ping, _>(PingHandler)
            .register::<Fail, _>(PingHandler);

        let harness = Harness::new();
        let mut ctx = harness.anonymous();

        assert_eq!(dispatcher.send(Ping, &mut ctx).await.unwrap(), "pong");
        assert!(matches!(
            dispatcher.send(Fail, &mut ctx).await,
            Err(Error::Forbidden)
        ));

        assert_eq!(counting.before.load(Ordering::SeqCst), 2);
        assert_eq!(counting.after.load(Ordering::SeqCst), 1);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_request_is_internal_error() {
        let dispatcher = Dispatcher::new();
        let harness = Harness::new();
        let mut ctx = harness.anonymous();

        let err = dispatcher.send(Ping, &mut ctx).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(!dispatcher.is_registered::<Ping>());
    }
}

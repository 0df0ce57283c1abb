//! The running HTTP server

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use vanfleet_core::{Error, Result};

use crate::api::{self, AppState};

/// A fully wired VanFleet server.
pub struct VanFleetServer {
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    bind_address: String,
    port: u16,
}

impl VanFleetServer {
    /// Create a new server builder
    pub fn builder() -> crate::builder::ServerBuilder {
        crate::builder::ServerBuilder::new()
    }

    pub(crate) fn new(
        state: AppState,
        shutdown_tx: watch::Sender<bool>,
        bind_address: String,
        port: u16,
    ) -> Self {
        Self {
            state,
            shutdown_tx,
            bind_address,
            port,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Address the server listens on, as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// The application router, for serving or driving in tests.
    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Trigger a graceful shutdown.
    ///
    /// In-flight requests see their cancellation fire and abandon any
    /// commit they have not started.
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(true)
            .map_err(|e| Error::internal(e.to_string()))
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        let address = self.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| Error::configuration(format!("Cannot bind {address}: {e}")))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if let Ok(local) = listener.local_addr() {
            info!(address = %local, "VanFleet server listening");
        }
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown_rx.wait_for(|stop| *stop).await.ok();
            })
            .await
            .map_err(|e| Error::internal(e.to_string()))?;
        info!("VanFleet server stopped");
        Ok(())
    }
}

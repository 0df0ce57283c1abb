//! Request cancellation signal.
//!
//! A [`Cancellation`] is handed to every persistence call that commits.
//! The server derives one per request from its shutdown channel, so an
//! in-flight request observes shutdown and abandons its commit instead of
//! writing half of it.

use tokio::sync::watch;

/// Receiving side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

/// Sending side of a cancellation signal.
#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl Cancellation {
    /// A signal that never fires.
    pub fn none() -> Self {
        Self { rx: None }
    }

    /// Observe an existing watch channel; `true` means cancelled.
    pub fn from_watch(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Create a fresh source and its signal.
    pub fn pair() -> (CancellationSource, Self) {
        let (tx, rx) = watch::channel(false);
        (CancellationSource { tx }, Self::from_watch(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once the signal fires. Pends forever if it never can.
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::none()
    }
}

impl CancellationSource {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

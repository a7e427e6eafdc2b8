//! Caller-supplied deadline and cancellation for ledger operations.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::core::{CapacityError, CapacityResult};

/// Deadline and cancellation signal carried by every mutating operation.
///
/// When either fires, the in-flight operation future is dropped. Any open
/// transaction is dropped with it, which discards its staged writes and
/// releases its row locks.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    timeout: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Handle that cancels every [`RequestContext`] cloned from its pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// Context with no deadline and no cancellation.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Context paired with a handle that can cancel it.
    #[must_use]
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                timeout: None,
                cancel: Some(rx),
            },
            CancelHandle { tx },
        )
    }

    /// Attach a deadline relative to when the operation starts running.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Configured deadline, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether cancellation has already been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Drive `fut` to completion unless cancellation or the deadline wins.
    ///
    /// An already-cancelled context never polls `fut`.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Cancelled`] or [`CapacityError::TimedOut`] when
    /// the operation is abandoned, otherwise whatever `fut` returns.
    pub async fn run<T, F>(&self, fut: F) -> CapacityResult<T>
    where
        F: Future<Output = CapacityResult<T>>,
    {
        let cancelled = wait_cancelled(self.cancel.clone());
        let deadline = wait_deadline(self.timeout);
        tokio::select! {
            biased;
            () = cancelled => Err(CapacityError::Cancelled),
            () = deadline => Err(CapacityError::TimedOut(self.timeout.unwrap_or_default())),
            res = fut => res,
        }
    }
}

async fn wait_cancelled(rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = rx else {
        return std::future::pending().await;
    };
    // Sender dropped without cancelling: never fires.
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn wait_deadline(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

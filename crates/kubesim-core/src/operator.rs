//! Operator control: stopping a running simulation.
//!
//! A [`StopHandle`] / [`StopSignal`] pair is created with [`stop_channel`].
//! The handle is held by whoever may end the run (a Ctrl-C listener, a
//! test, an embedding service); the signal is observed by both the
//! simulation loop and the background time source, so one request stops
//! both.
//!
//! # Architecture
//!
//! The pair wraps a [`tokio::sync::watch`] channel carrying the stop reason.
//! Once a reason is set it is never cleared.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Reason why the simulation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// An operator requested a stop, with the given reason.
    Stopped(String),
}

/// Requests a stop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<Option<String>>>,
}

/// Observes stop requests. Cheap to clone; each clone sees the same request.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<Option<String>>,
}

/// Create a connected stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(None);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

impl StopHandle {
    /// Request a stop. Only the first reason is kept.
    pub fn stop(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

impl StopSignal {
    /// The stop reason, if a stop has been requested.
    pub fn reason(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Wait until a stop is requested and return its reason.
    ///
    /// If every [`StopHandle`] is dropped without requesting a stop, this
    /// never resolves.
    pub async fn stopped(&mut self) -> String {
        loop {
            if let Some(reason) = self.rx.borrow_and_update().clone() {
                return reason;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn first_reason_wins() {
        let (handle, signal) = stop_channel();
        assert!(!handle.is_stopped());
        assert_eq!(signal.reason(), None);

        handle.stop("ctrl-c");
        handle.stop("second");
        assert!(handle.is_stopped());
        assert_eq!(signal.reason().as_deref(), Some("ctrl-c"));
    }

    #[tokio::test]
    async fn stopped_resolves_after_request() {
        let (handle, mut signal) = stop_channel();
        let waiter = tokio::spawn(async move { signal.stopped().await });

        tokio::task::yield_now().await;
        handle.stop("done");

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(reason, Ok(Ok(ref r)) if r == "done"));
    }

    #[tokio::test]
    async fn stopped_resolves_immediately_when_already_stopped() {
        let (handle, mut signal) = stop_channel();
        handle.stop("early");
        assert_eq!(signal.stopped().await, "early");
    }

    #[tokio::test]
    async fn dropped_handle_never_stops() {
        let (handle, mut signal) = stop_channel();
        drop(handle);
        let result = tokio::time::timeout(Duration::from_millis(20), signal.stopped()).await;
        assert!(result.is_err());
    }
}

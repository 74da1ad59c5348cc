//! # Cancellation Signal (`stream::cancel`)
//!
//! File: cli/src/stream/cancel.rs
//! Author: Christi Mahu
//!
//! A cloneable, fire-once signal. Every `Stream` built with one races each of
//! its reads against it: once fired, pending and future reads report
//! end-of-stream immediately. Firing does not kill anything; processes that
//! must die with the signal should also be built with `kill_on_drop(true)`.
//!
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Fire-once cancellation shared between a controller and any number of streams.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Fires the signal. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal has fired, immediately if it already has.
    /// Never resolves if every clone of the signal is dropped unfired.
    pub(crate) fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            let fired = receiver.wait_for(|cancelled| *cancelled).await.is_ok();
            if !fired {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let signal = CancelSignal::new();
        let waiter = tokio::spawn(signal.cancelled());
        assert!(!signal.is_cancelled());
        signal.clone().cancel();
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("cancellation observed")
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_is_immediate_when_already_fired() {
        let signal = CancelSignal::new();
        signal.cancel();
        tokio::time::timeout(Duration::from_millis(200), signal.cancelled())
            .await
            .expect("already-fired signal resolves at once");
    }

    #[tokio::test]
    async fn test_dropped_signal_never_fires() {
        let waiter = CancelSignal::new().cancelled();
        let result = tokio::time::timeout(Duration::from_millis(50), waiter).await;
        assert!(result.is_err());
    }
}

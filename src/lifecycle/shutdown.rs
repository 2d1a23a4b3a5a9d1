//! Stop requests for running serverless loops.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// Asks serverless loops to stop before their next exchange.
///
/// A loop holds a receiver and checks it only while waiting for the first
/// byte of a new request, so an exchange already in progress always
/// completes.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Receiver for [`ServerlessApplication::run_with_shutdown`]. Subscribing
    /// after the trigger yields a receiver that is already signalled.
    ///
    /// [`ServerlessApplication::run_with_shutdown`]: crate::framing::ServerlessApplication::run_with_shutdown
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        if self.is_triggered() {
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            return rx;
        }
        self.tx.subscribe()
    }

    /// Request a stop. Returns `false` when a stop was already requested.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Loops still listening.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listeners_observe_the_first_trigger_only() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.listeners(), 1);

        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_is_already_signalled() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut rx = shutdown.subscribe();
        assert!(shutdown.is_triggered());
        assert!(rx.recv().await.is_ok());
    }
}

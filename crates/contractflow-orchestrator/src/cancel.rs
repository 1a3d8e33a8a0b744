//! Explicit cancellation of an in-flight run.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle that cancels the coordinator's current run.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel the in-flight phase. The run moves to `FAILED` with
    /// `error_kind = cancelled`.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clear a previous cancellation and subscribe.
    pub(crate) fn arm(&self) -> CancelSignal {
        self.tx.send_replace(false);
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side, owned by one run.
#[derive(Debug)]
pub(crate) struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; never if the handle is gone.
    pub(crate) async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
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
    async fn test_cancel_wakes_waiter() {
        let handle = CancelHandle::new();
        let mut signal = handle.arm();
        let remote = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.cancel();
        });
        tokio::time::timeout(Duration::from_secs(5), signal.cancelled())
            .await
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_arm_resets() {
        let handle = CancelHandle::new();
        handle.cancel();
        assert!(handle.is_cancelled());
        let signal = handle.arm();
        assert!(!signal.is_cancelled());
    }
}

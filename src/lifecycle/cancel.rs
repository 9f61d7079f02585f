//! Cooperative cancellation for blocking phase runs.
//!
//! A phase run may suspend for the full lifetime of its container. The
//! caller holds a [`CancelHandle`]; the running phase observes the paired
//! [`CancelSignal`] and aborts promptly when it fires.

use tokio::sync::watch;

/// Create a connected handle/signal pair.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] never
/// cancels the signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Fires cancellation toward every signal cloned from the pair.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observer side of [`cancel_pair`]. Cheap to clone.
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Non-blocking probe.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation fires; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Why a request stopped before the server answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// A newer query for the same resource kind replaced this one.
    Superseded,
    /// The user chose to stop waiting.
    User,
    /// The extended wait ran out.
    Timeout,
}

/// Cooperative cancellation signal shared by the controller and one fetch.
///
/// The signal carries its reason. The first `cancel` wins; later calls are
/// no-ops, so cancellation is idempotent.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<Option<CancellationReason>>>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns `false` when the token had already been cancelled.
    pub fn cancel(&self, reason: CancellationReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = Some(reason);
                true
            }
        })
    }

    #[must_use]
    pub fn reason(&self) -> Option<CancellationReason> {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the token is cancelled, yielding the reason.
    pub async fn cancelled(&self) -> CancellationReason {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            // The sender lives as long as `self`, so this only errs if the
            // channel is torn down underneath us.
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

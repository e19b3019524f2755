use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// The right of an in-flight operation to be aborted.
///
/// Clones share the same underlying flag, so a token handed to a provider
/// observes a `cancel` issued through the store's copy. Cancelling is
/// idempotent; cancelling a token whose operation already settled is a no-op.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    pub fn cancel(&self) {
        self.flag.send_if_modified(|cancelled| {
            let was_cancelled = *cancelled;
            *cancelled = true;
            !was_cancelled
        });
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.flag.subscribe();
        // the sender lives as long as `self`, so this never fails
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Drives `future` until it completes or the token is cancelled,
    /// whichever happens first. A token cancelled before the call never
    /// polls `future`.
    pub async fn run_until_cancelled<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            output = future => Some(output),
        }
    }
}

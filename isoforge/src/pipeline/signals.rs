//! Cancel and halt flags shared between the executor, tasks and callers.

use isoforge_shared::errors::{BuildError, BuildResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Terminal flags of one pipeline run.
///
/// Cheap to clone; every clone observes the same flags. Once set, a flag is
/// never cleared. `cancel` may be called from any thread.
#[derive(Clone, Default)]
pub struct PipelineSignals {
    inner: Arc<SignalsInner>,
}

#[derive(Default)]
struct SignalsInner {
    cancelled: AtomicBool,
    halted: AtomicBool,
    notify: Notify,
}

impl PipelineSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` only for the call that set the flag.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn halt(&self) {
        self.inner.halted.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_halted(&self) -> bool {
        self.inner.halted.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration`, returning early with `Cancelled` on cancellation.
    pub async fn sleep(&self, duration: Duration) -> BuildResult<()> {
        if self.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(BuildError::Cancelled),
        }
    }
}

impl std::fmt::Debug for PipelineSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSignals")
            .field("cancelled", &self.is_cancelled())
            .field("halted", &self.is_halted())
            .finish()
    }
}

// Trigger coalescing and invocation ordering

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Issues monotonically increasing invocation numbers. Only the most
/// recently issued number is current; anything older is stale.
#[derive(Debug, Clone, Default)]
pub struct InvocationSequencer {
    latest: Arc<AtomicU64>,
}

impl InvocationSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next number. The first issued number is 1.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, seq: u64) -> bool {
        self.latest() == seq
    }
}

/// Delays work until no new work has been scheduled for `window`.
///
/// At most one trigger is pending. Scheduling replaces the pending trigger;
/// once a trigger fires its work runs detached and is no longer affected by
/// `cancel`.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn schedule<F>(&mut self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let window = self.window;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            tokio::spawn(work);
        }));
    }

    /// Cancel the pending trigger. Returns true if one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Burst coalescing for re-render requests.
//!
//! Every `request()` bumps a pending counter and schedules a delayed task.
//! Each task decrements the counter when it fires; only the task that brings
//! it back to zero runs the callback, so a burst of requests yields one run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

pub const DEFAULT_COALESCE_DELAY: Duration = Duration::from_millis(16);

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct RenderCoalescer {
    pending: Arc<AtomicUsize>,
    delay: Duration,
    callback: Callback,
}

impl RenderCoalescer {
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            pending: Arc::new(AtomicUsize::new(0)),
            delay,
            callback: Arc::new(callback),
        }
    }

    /// Schedules a callback run. Must be called inside a tokio runtime.
    pub fn request(&self) {
        let queued = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("render requested, {} pending", queued);

        let pending = Arc::clone(&self.pending);
        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                callback();
            }
        });
    }

    /// Requests that have not fired yet.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl std::fmt::Debug for RenderCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCoalescer")
            .field("pending", &self.pending())
            .field("delay", &self.delay)
            .finish()
    }
}

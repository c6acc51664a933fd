//! Deferred hard removal of soft-deleted groups.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

/// Default undo window for a soft-deleted group.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct Timer {
    token: u64,
    handle: AbortHandle,
}

/// One cancellable timer per group. Scheduling again for the same group
/// replaces the previous timer.
#[derive(Debug, Clone)]
pub struct RemovalScheduler {
    grace_period: Duration,
    timers: Arc<DashMap<String, Timer>>,
    next_token: Arc<AtomicU64>,
}

impl Default for RemovalScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl RemovalScheduler {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            timers: Arc::new(DashMap::new()),
            next_token: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Run `on_expire` once the grace period ends, unless cancelled first.
    pub fn schedule<F>(&self, group_id: &str, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel(group_id);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let id = group_id.to_string();
        let grace_period = self.grace_period;
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            // a replaced or cancelled timer no longer owns the entry
            if timers.remove_if(&id, |_, timer| timer.token == token).is_some() {
                debug!(group_id = %id, "grace period over");
                on_expire();
            }
        });
        self.timers.insert(
            group_id.to_string(),
            Timer {
                token,
                handle: task.abort_handle(),
            },
        );
    }

    /// Cancel a pending removal. Returns `false` if none was scheduled.
    pub fn cancel(&self, group_id: &str) -> bool {
        match self.timers.remove(group_id) {
            Some((_, timer)) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        self.timers.retain(|_, timer| {
            timer.handle.abort();
            false
        });
    }

    pub fn is_scheduled(&self, group_id: &str) -> bool {
        self.timers.contains_key(group_id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&fired);
        (fired, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_grace_period() {
        let scheduler = RemovalScheduler::new(Duration::from_secs(10));
        let (fired, on_expire) = counter();
        scheduler.schedule("g", on_expire);
        assert!(scheduler.is_scheduled("g"));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_expiry() {
        let scheduler = RemovalScheduler::default();
        let (fired, on_expire) = counter();
        scheduler.schedule("g", on_expire);
        assert!(scheduler.cancel("g"));
        assert!(!scheduler.cancel("g"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_timer() {
        let scheduler = RemovalScheduler::new(Duration::from_secs(10));
        let (first, on_first) = counter();
        let (second, on_second) = counter();
        scheduler.schedule("g", on_first);
        tokio::time::sleep(Duration::from_secs(5)).await;
        scheduler.schedule("g", on_second);
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_clears_timers() {
        let scheduler = RemovalScheduler::default();
        let (fired, on_expire) = counter();
        scheduler.schedule("a", on_expire);
        scheduler.schedule("b", || {});
        scheduler.cancel_all();
        assert!(scheduler.is_empty());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}

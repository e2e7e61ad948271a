use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Background timer that periodically runs a save.
///
/// The first tick fires one full period after [`SyncScheduler::start`]. A
/// tick returning [`ControlFlow::Break`] ends the timer, which is how the
/// task notices its database has gone away. Dropping the scheduler stops it.
#[derive(Debug)]
pub struct SyncScheduler {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawn the timer task on the current tokio runtime.
    pub fn start<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tick().await.is_break() {
                    debug!("sync timer finished");
                    break;
                }
            }
        });

        debug!(period_ms = period.as_millis() as u64, "sync timer started");
        Self {
            period,
            handle: Some(handle),
        }
    }

    /// Stop the timer. Calling this again is a no-op.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("sync timer stopped");
        }
    }

    /// Returns `true` until [`stop`](Self::stop) is called or the task ends.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<ControlFlow<()>> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(ControlFlow::Continue(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = SyncScheduler::start(Duration::from_millis(100), counting(&counter));
        assert_eq!(scheduler.period(), Duration::from_millis(100));

        // Nothing fires before the first full period.
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = SyncScheduler::start(Duration::from_millis(10), counting(&counter));
        assert!(scheduler.is_running());

        time::sleep(Duration::from_millis(25)).await;
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        let seen = counter.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn break_ends_the_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let scheduler = SyncScheduler::start(Duration::from_millis(10), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            std::future::ready(ControlFlow::Break(()))
        });

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());
    }
}

//! Per-key debounce timer built on tokio tasks.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Delays an action until a quiet period has elapsed. Scheduling again
/// before the delay fires aborts the pending action and restarts the timer.
#[derive(Default)]
pub struct Debouncer {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run after `delay`, replacing any pending run.
    pub fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Cancel the pending action, if any.
    pub fn cancel(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = slot.take() {
            task.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fires_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new();
        let c = Arc::clone(&counter);
        debouncer.schedule(Duration::from_millis(10), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rescheduling_collapses_earlier_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new();
        for _ in 0..5 {
            let c = Arc::clone(&counter);
            debouncer.schedule(Duration::from_millis(20), async move {
                c.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_prevents_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new();
        let c = Arc::clone(&counter);
        debouncer.schedule(Duration::from_millis(10), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}

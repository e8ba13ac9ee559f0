// Debounced task scheduling with cancel-on-supersede
use super::lock;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;

#[derive(Default)]
struct Pending {
    generation: u64,
    handle: Option<AbortHandle>,
}

/// Runs only the last task scheduled within a quiet window.
///
/// A task that has started running is no longer pending: superseding it
/// only cancels tasks still waiting out their window.
pub struct Debouncer {
    window: Duration,
    pending: Arc<Mutex<Pending>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let shared = self.pending.clone();
        let mut pending = lock(&self.pending);
        pending.generation += 1;
        let generation = pending.generation;
        if let Some(previous) = pending.handle.take() {
            previous.abort();
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            {
                let mut pending = lock(&shared);
                if pending.generation != generation {
                    return;
                }
                pending.handle = None;
            }
            task.await;
        });
        pending.handle = Some(handle.abort_handle());
    }

    pub fn cancel(&self) {
        let mut pending = lock(&self.pending);
        pending.generation += 1;
        if let Some(previous) = pending.handle.take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending)
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_only_last_task_runs() {
        let debouncer = Debouncer::new(Duration::from_millis(2000));
        let runs = Arc::new(Mutex::new(Vec::new()));

        for n in 0..5 {
            let runs = runs.clone();
            debouncer.schedule(async move { runs.lock().unwrap().push(n) });
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert!(runs.lock().unwrap().is_empty());
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(*runs.lock().unwrap(), vec![4]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_each_run() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let count = count.clone();
            debouncer.schedule(async move {
                count.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_task() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();
        debouncer.schedule(async move {
            task_count.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

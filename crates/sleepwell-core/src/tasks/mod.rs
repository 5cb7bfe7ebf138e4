//! Keyed background tasks on the tokio runtime.
//!
//! Every task is registered under a string key. Scheduling a key that is
//! already pending cancels the earlier instance, so re-scheduling replaces
//! rather than duplicates. Tasks are cancelled by key, never by handle.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Entry {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, Entry>,
}

/// Cloneable handle to the keyed task registry.
#[derive(Clone, Default)]
pub struct TaskScheduler {
    registry: Arc<Mutex<Registry>>,
    generations: Arc<AtomicU64>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, key: &str, generation: u64, token: CancellationToken, handle: JoinHandle<()>) {
        let previous = self.lock().entries.insert(
            key.to_string(),
            Entry {
                generation,
                token,
                handle,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(key, "replaced pending task");
            previous.token.cancel();
        }
    }

    /// Remove `key` only if it still belongs to `generation`.
    fn finish(&self, key: &str, generation: u64) {
        let mut registry = self.lock();
        if registry
            .entries
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            registry.entries.remove(key);
        }
    }

    fn reserve(&self) -> (u64, CancellationToken) {
        (
            self.generations.fetch_add(1, Ordering::SeqCst),
            CancellationToken::new(),
        )
    }

    /// Run `task` once after `delay`, replacing any task pending under `key`.
    ///
    /// The task may re-schedule its own key; the new instance is kept.
    pub fn schedule_once<F>(&self, key: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (generation, token) = self.reserve();
        let child = token.clone();
        let this = self.clone();
        let owned_key = key.to_string();

        // Hold the registry lock while spawning so the task cannot finish
        // before its entry exists.
        let mut registry = self.lock();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    tracing::debug!(key = %owned_key, "one-shot task firing");
                    task.await;
                }
                _ = child.cancelled() => {
                    tracing::debug!(key = %owned_key, "one-shot task cancelled");
                }
            }
            this.finish(&owned_key, generation);
        });
        let previous = registry.entries.insert(
            key.to_string(),
            Entry {
                generation,
                token,
                handle,
            },
        );
        drop(registry);
        if let Some(previous) = previous {
            tracing::debug!(key, "replaced pending task");
            previous.token.cancel();
        }
    }

    /// Run `task` every `period`, first run immediately. Replaces any task
    /// pending under `key`. A run in progress is abandoned on cancel.
    pub fn schedule_periodic<F>(&self, key: &str, period: Duration, task: F)
    where
        F: Fn() -> TaskFuture + Send + Sync + 'static,
    {
        let (generation, token) = self.reserve();
        let child = token.clone();
        let owned_key = key.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = task() => {}
                            _ = child.cancelled() => break,
                        }
                    }
                    _ = child.cancelled() => break,
                }
            }
            tracing::debug!(key = %owned_key, "periodic task stopped");
        });
        self.insert(key, generation, token, handle);
    }

    /// Cancel the task under `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.lock().entries.remove(key) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every task whose key starts with `prefix`.
    pub fn cancel_prefix(&self, prefix: &str) -> usize {
        let mut registry = self.lock();
        let keys: Vec<String> = registry
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &keys {
            if let Some(entry) = registry.entries.remove(key) {
                entry.token.cancel();
            }
        }
        keys.len()
    }

    pub fn cancel_all(&self) {
        let drained: Vec<Entry> = self.lock().entries.drain().map(|(_, e)| e).collect();
        for entry in drained {
            entry.token.cancel();
        }
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    /// Pending keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| !entry.handle.is_finished())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(count: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let count = count.clone();
        async move {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn once_fires_after_delay() {
        let scheduler = TaskScheduler::new();
        let count = counter();
        scheduler.schedule_once("k", Duration::from_secs(60), bump(&count));
        assert!(scheduler.is_scheduled("k"));

        tokio::time::sleep(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_scheduled("k"));
        assert!(scheduler.keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_pending_task() {
        let scheduler = TaskScheduler::new();
        let first = counter();
        let second = counter();
        scheduler.schedule_once("k", Duration::from_secs(10), bump(&first));
        scheduler.schedule_once("k", Duration::from_secs(20), bump(&second));
        assert_eq!(scheduler.keys(), vec!["k".to_string()]);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_by_key() {
        let scheduler = TaskScheduler::new();
        let count = counter();
        scheduler.schedule_once("a", Duration::from_secs(5), bump(&count));
        scheduler.schedule_once("b", Duration::from_secs(5), bump(&count));
        assert!(scheduler.cancel("a"));
        assert!(!scheduler.cancel("missing"));

        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn task_can_rearm_its_own_key() {
        let scheduler = TaskScheduler::new();
        let count = counter();
        let inner = scheduler.clone();
        let inner_count = count.clone();
        scheduler.schedule_once("k", Duration::from_secs(1), async move {
            inner_count.fetch_add(1, Ordering::SeqCst);
            let again = inner_count.clone();
            inner.schedule_once("k", Duration::from_secs(1), async move {
                again.fetch_add(1, Ordering::SeqCst);
            });
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_scheduled("k"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_runs_until_cancelled() {
        let scheduler = TaskScheduler::new();
        let count = counter();
        let task_count = count.clone();
        scheduler.schedule_periodic("tick", Duration::from_secs(600), move || -> TaskFuture {
            Box::pin(bump(&task_count))
        });
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1201)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        assert!(scheduler.cancel("tick"));
        tokio::time::sleep(Duration::from_secs(1800)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!scheduler.is_scheduled("tick"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_and_prefix() {
        let scheduler = TaskScheduler::new();
        let count = counter();
        scheduler.schedule_once("n_MON_sleep", Duration::from_secs(5), bump(&count));
        scheduler.schedule_once("n_MON_wake", Duration::from_secs(5), bump(&count));
        scheduler.schedule_once("other", Duration::from_secs(5), bump(&count));

        assert_eq!(scheduler.cancel_prefix("n_"), 2);
        assert_eq!(scheduler.keys(), vec!["other".to_string()]);
        scheduler.cancel_all();
        assert!(scheduler.keys().is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

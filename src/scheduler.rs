//! Timer plumbing for the fire-and-forget jobs: the repeating ad post, the
//! delayed manual trigger and the welcome-message cleanup. Tasks are plain
//! tokio tasks tracked by id so pending work is observable and cancellable;
//! nothing is persisted, a restart drops whatever was scheduled.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Default)]
pub struct Scheduler {
    tasks: Mutex<HashMap<TaskId, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `job` after `initial_delay`, then again every `every`.
    pub fn schedule_repeating<F, Fut>(
        &self,
        initial_delay: Duration,
        every: Duration,
        job: F,
    ) -> TaskId
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.track(tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            // The first interval tick completes immediately.
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                job().await;
            }
        }))
    }

    /// Runs `job` once after `delay`.
    pub fn schedule_once<Fut>(&self, delay: Duration, job: Fut) -> TaskId
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.track(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        }))
    }

    /// Aborts a scheduled task. Returns `false` if it already ran or was
    /// cancelled before.
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.lock_tasks().remove(&id) {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Number of tasks still scheduled or running.
    pub fn pending(&self) -> usize {
        let mut tasks = self.lock_tasks();
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.len()
    }

    /// Aborts everything. Called on shutdown.
    pub fn shutdown(&self) {
        for (_, handle) in self.lock_tasks().drain() {
            handle.abort();
        }
    }

    fn track(&self, handle: JoinHandle<()>) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut tasks = self.lock_tasks();
        // Drop finished one-shots so the map never grows with stale handles.
        tasks.retain(|_, h| !h.is_finished());
        tasks.insert(id, handle);
        id
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, JoinHandle<()>>> {
        self.tasks.lock().expect("scheduler mutex poisoned")
    }

    /// Raw map size, without the pruning [`pending`](Self::pending) does.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.lock_tasks().len()
    }
}

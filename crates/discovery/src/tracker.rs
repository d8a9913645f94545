//! Background task tracking keyed by correlation id.

use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

/// Finished but unjoined tasks kept by default before the oldest are dropped.
pub const DEFAULT_FINISHED_RETENTION: usize = 256;

struct Tracked<T> {
    seq: u64,
    handle: JoinHandle<T>,
}

struct Inner<T> {
    tasks: HashMap<String, Tracked<T>>,
    next_seq: u64,
}

impl<T> Inner<T> {
    /// Drop the oldest finished tasks until at most `keep` remain.
    fn prune_finished(&mut self, keep: usize) {
        let mut finished: Vec<(u64, String)> = self
            .tasks
            .iter()
            .filter(|(_, t)| t.handle.is_finished())
            .map(|(id, t)| (t.seq, id.clone()))
            .collect();
        if finished.len() <= keep {
            return;
        }
        finished.sort_unstable();
        let excess = finished.len() - keep;
        for (_, id) in finished.into_iter().take(excess) {
            self.tasks.remove(&id);
            debug!(task_id = %id, "Dropped unjoined finished task");
        }
    }
}

/// Owns the join handles of spawned delegations.
///
/// Finished tasks stay joinable until more than the retention limit pile
/// up; the oldest are then dropped on the next spawn.
pub struct TaskTracker<T> {
    inner: Mutex<Inner<T>>,
    finished_retention: usize,
}

impl<T: Send + 'static> Default for TaskTracker<T> {
    fn default() -> Self {
        Self::with_retention(DEFAULT_FINISHED_RETENTION)
    }
}

impl<T: Send + 'static> TaskTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(finished_retention: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: HashMap::new(),
                next_seq: 0,
            }),
            finished_retention,
        }
    }

    /// Spawn `fut` under `id`. An existing task with the same id is aborted.
    pub async fn spawn<F>(&self, id: impl Into<String>, fut: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let id = id.into();
        let handle = tokio::spawn(fut);
        let mut inner = self.inner.lock().await;
        inner.prune_finished(self.finished_retention);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if let Some(previous) = inner.tasks.insert(id.clone(), Tracked { seq, handle }) {
            previous.handle.abort();
        }
        debug!(task_id = %id, "Tracking background task");
    }

    /// Abort a task. Returns `false` if the id is unknown.
    pub async fn cancel(&self, id: &str) -> bool {
        match self.inner.lock().await.tasks.remove(id) {
            Some(tracked) => {
                tracked.handle.abort();
                debug!(task_id = %id, "Cancelled background task");
                true
            }
            None => false,
        }
    }

    /// Wait for a task and stop tracking it. `None` if the id is unknown.
    pub async fn join(&self, id: &str) -> Option<Result<T, JoinError>> {
        let tracked = self.inner.lock().await.tasks.remove(id)?;
        Some(tracked.handle.await)
    }

    /// Ids of tracked tasks that have not finished yet.
    pub async fn in_flight(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<String> = inner
            .tasks
            .iter()
            .filter(|(_, t)| !t.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ids of every tracked task, finished or not.
    pub async fn tracked(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().await.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn join_returns_output() {
        let tracker = TaskTracker::new();
        tracker.spawn("a", async { 41 + 1 }).await;
        assert_eq!(tracker.join("a").await.unwrap().unwrap(), 42);
        assert!(tracker.join("a").await.is_none());
    }

    #[tokio::test]
    async fn cancel_aborts() {
        let tracker = TaskTracker::new();
        tracker
            .spawn("slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                1
            })
            .await;

        assert_eq!(tracker.in_flight().await, vec!["slow"]);
        assert!(tracker.cancel("slow").await);
        assert!(!tracker.cancel("slow").await);
        assert!(tracker.in_flight().await.is_empty());
    }

    #[tokio::test]
    async fn finished_tasks_leave_in_flight() {
        let tracker = TaskTracker::new();
        tracker.spawn("quick", async { "done" }).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(tracker.in_flight().await.is_empty());
        assert_eq!(tracker.tracked().await, vec!["quick"]);
    }

    #[tokio::test]
    async fn unjoined_finished_tasks_are_capped() {
        let tracker = TaskTracker::with_retention(2);
        for i in 0..10 {
            tracker.spawn(format!("t{i}"), async move { i }).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        tracker.spawn("t10", async { 10 }).await;
        assert_eq!(tracker.tracked().await, vec!["t10", "t8", "t9"]);
        assert_eq!(tracker.join("t9").await.unwrap().unwrap(), 9);
        assert!(tracker.join("t0").await.is_none());
    }

    #[tokio::test]
    async fn running_tasks_are_never_pruned() {
        let tracker = TaskTracker::with_retention(0);
        tracker
            .spawn("slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                0
            })
            .await;
        tracker.spawn("next", async { 1 }).await;
        assert!(tracker.tracked().await.contains(&"slow".to_string()));
        assert!(tracker.cancel("slow").await);
    }
}

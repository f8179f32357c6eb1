//! In-memory scheduler: holds acknowledged tasks until they come due.
//!
//! Not durable. Good for tests, the CLI and single-process deployments; a
//! real deployment puts a persistent queue behind the [`Scheduler`] trait.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ruleflow_core::{Result, Scheduler, Task};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MemoryScheduler {
    queue: Mutex<Vec<Task>>,
    total: AtomicU64,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of queued tasks, in acknowledge order.
    pub async fn pending(&self) -> Vec<Task> {
        self.queue.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    /// Tasks acknowledged since creation, including the ones already taken.
    pub fn total_scheduled(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Earliest due date in the queue.
    pub async fn next_due(&self) -> Option<DateTime<Utc>> {
        self.queue.lock().await.iter().map(|t| t.date()).min()
    }

    /// Remove and return every task due at `now`, earliest first.
    pub async fn take_due(&self, now: DateTime<Utc>) -> Vec<Task> {
        let mut queue = self.queue.lock().await;
        let (mut due, later): (Vec<Task>, Vec<Task>) =
            queue.drain(..).partition(|t| t.is_due(now));
        *queue = later;
        due.sort_by_key(|t| t.date());
        due
    }
}

#[async_trait]
impl Scheduler for MemoryScheduler {
    async fn schedule(&self, task: Task) -> Result<()> {
        tracing::debug!(
            "📥 Queued {}/{} due {}",
            task.event(),
            task.channel(),
            task.date()
        );
        self.queue.lock().await.push(task);
        self.total.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn task(name: &str, due: i64) -> Task {
        Task::new(name, "e", at(due), None, json!({}))
    }

    #[tokio::test]
    async fn test_take_due_keeps_future_tasks() {
        let sched = MemoryScheduler::new();
        sched.schedule(task("late", 30)).await.unwrap();
        sched.schedule(task("b", 20)).await.unwrap();
        sched.schedule(task("a", 10)).await.unwrap();

        assert_eq!(sched.next_due().await, Some(at(10)));

        let due = sched.take_due(at(20)).await;
        let names: Vec<&str> = due.iter().map(|t| t.channel()).collect();
        assert_eq!(names, vec!["a", "b"]);

        assert_eq!(sched.len().await, 1);
        assert_eq!(sched.pending().await[0].channel(), "late");
        assert_eq!(sched.total_scheduled(), 3);
    }

    #[tokio::test]
    async fn test_empty() {
        let sched = MemoryScheduler::new();
        assert!(sched.is_empty().await);
        assert!(sched.take_due(at(0)).await.is_empty());
        assert_eq!(sched.next_due().await, None);
    }
}

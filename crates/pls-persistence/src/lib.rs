//! Event-sourced persistence (spec §4.7): an append-only event log backed
//! by SQLite, periodic snapshots, and crash recovery by
//! snapshot-then-replay.

mod error;
mod event;
mod payload;
mod recovery;
mod store;

pub use error::{PersistenceError, Result};
pub use event::{Event, EventKind};
pub use payload::{calendar_to_payload, task_to_payload};
pub use recovery::{recover, RecoveredState};
pub use store::{PersistenceService, Snapshot, DEFAULT_FLUSH_THRESHOLD, DEFAULT_SNAPSHOT_THRESHOLD};

use std::sync::Arc;
use std::time::Duration;

use pls_core::{Calendar, Task};
use serde_json::Value;
use tokio::task::JoinHandle;

/// Default flush-timer interval (spec §4.7 "target ≤ 250 ms").
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);
/// Default snapshot-timer interval (spec §4.7 "on a timer (default 60 s)").
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a background task that periodically flushes the event queue
/// (spec §4.7, §5 "The persistence flush is an asynchronous task that may
/// suspend on I/O"). Returns a handle the caller can abort on shutdown
/// after issuing a final `force_flush`.
pub fn spawn_flush_timer(service: Arc<PersistenceService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(error) = service.flush() {
                tracing::error!(%error, "event log flush failed; batch retained for retry");
            }
        }
    })
}

/// Spawn a background task that periodically snapshots project state (spec
/// §4.7 "on a timer (default 60 s)"), also snapshotting early whenever the
/// event log's unflushed-since-last-snapshot count crosses
/// `DEFAULT_SNAPSHOT_THRESHOLD` (spec §4.7 "or whenever the event log's
/// unflushed count crosses a threshold"), so a long-running process never
/// accumulates an unbounded replay on recovery. `state_provider` is called
/// on each check to get the current `(tasks, calendar, trade_partners)`;
/// `pls-persistence` has no access to live project state itself, that lives
/// in `pls-controller`/`pls-host`.
pub fn spawn_snapshot_timer<F>(service: Arc<PersistenceService>, interval: Duration, mut state_provider: F) -> JoinHandle<()>
where
    F: FnMut() -> (Vec<Task>, Calendar, Vec<Value>) + Send + 'static,
{
    tokio::spawn(async move {
        let poll_interval = interval.min(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(poll_interval);
        let mut since_last_snapshot = Duration::ZERO;
        loop {
            ticker.tick().await;
            since_last_snapshot += poll_interval;
            if since_last_snapshot < interval && !service.should_snapshot() {
                continue;
            }
            since_last_snapshot = Duration::ZERO;

            let (tasks, calendar, trade_partners) = state_provider();
            if let Err(error) = service.snapshot(&tasks, &calendar, &trade_partners) {
                tracing::error!(%error, "periodic snapshot failed");
            }
        }
    })
}

/// Forced flush with a bounded timeout for shutdown (spec §5
/// "Cancellation & timeouts ... forced flush with a bounded timeout
/// (default 3 seconds); exceeding the timeout logs the loss and
/// proceeds").
pub async fn force_flush_with_timeout(service: Arc<PersistenceService>, timeout: Duration) {
    let result = tokio::time::timeout(timeout, async { tokio::task::block_in_place(|| service.flush()) }).await;
    match result {
        Ok(Ok(count)) => tracing::info!(count, "forced flush on shutdown completed"),
        Ok(Err(error)) => tracing::error!(%error, "forced flush on shutdown failed"),
        Err(_) => tracing::error!("forced flush on shutdown timed out; unflushed events are lost"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pls_core::{Calendar, Task};
    use serde_json::json;

    #[test]
    fn flush_then_recover_restores_state() {
        let service = PersistenceService::open_in_memory().unwrap();
        let task = Task::new("t1", "V", 3);
        let payload = task_to_payload(&task).unwrap();
        service.record(EventKind::TaskCreated, "t1", payload);
        service.flush().unwrap();
        service.snapshot(&[task.clone()], &Calendar::default(), &[]).unwrap();

        let recovered = recover(&service).unwrap();
        assert_eq!(recovered.tasks, vec![task]);
    }

    #[test]
    fn events_after_snapshot_are_replayed() {
        let service = PersistenceService::open_in_memory().unwrap();
        let t1 = Task::new("t1", "V", 1);
        service.record(EventKind::TaskCreated, "t1", task_to_payload(&t1).unwrap());
        service.flush().unwrap();
        service.snapshot(&[t1.clone()], &Calendar::default(), &[]).unwrap();

        let t2 = Task::new("t2", "W", 2);
        service.record(EventKind::TaskCreated, "t2", task_to_payload(&t2).unwrap());
        service.flush().unwrap();

        let recovered = recover(&service).unwrap();
        assert_eq!(recovered.tasks.len(), 2);
    }

    #[test]
    fn unflushed_events_are_absent_after_recovery() {
        let service = PersistenceService::open_in_memory().unwrap();
        let t1 = Task::new("t1", "V", 1);
        service.record(EventKind::TaskCreated, "t1", task_to_payload(&t1).unwrap());
        service.flush().unwrap();
        service.snapshot(&[t1.clone()], &Calendar::default(), &[]).unwrap();

        // Queued but never flushed: must not survive "crash" (simply never
        // calling flush again before recovery runs).
        let t2 = Task::new("t2", "W", 1);
        service.record(EventKind::TaskCreated, "t2", task_to_payload(&t2).unwrap());

        let recovered = recover(&service).unwrap();
        assert_eq!(recovered.tasks, vec![t1]);
    }

    /// S6 — crash recovery.
    #[test]
    fn s6_crash_recovery_scenario() {
        let service = PersistenceService::open_in_memory().unwrap();

        let t1 = Task::new("T1", "V", 1);
        let t2 = Task::new("T2", "W", 1);
        service.record(EventKind::TaskCreated, "T1", task_to_payload(&t1).unwrap());
        service.record(EventKind::TaskCreated, "T2", task_to_payload(&t2).unwrap());
        service.flush().unwrap();
        service.snapshot(&[t1.clone(), t2.clone()], &Calendar::default(), &[]).unwrap();

        let t3 = Task::new("T3", "X", 1);
        service.record(EventKind::TaskCreated, "T3", task_to_payload(&t3).unwrap());
        service.flush().unwrap();

        let t4 = Task::new("T4", "Y", 1);
        service.record(EventKind::TaskCreated, "T4", task_to_payload(&t4).unwrap());
        // Process "dies" here: T4 is never flushed.

        let recovered = recover(&service).unwrap();
        let ids: Vec<&str> = recovered.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2", "T3"]);
    }

    #[test]
    fn task_deleted_replay_is_tolerant_of_missing_prior_state() {
        let service = PersistenceService::open_in_memory().unwrap();
        service.record(EventKind::TaskDeleted, "never-existed", json!({}));
        service.flush().unwrap();

        let recovered = recover(&service).unwrap();
        assert!(recovered.tasks.is_empty());
    }

    #[test]
    fn flush_drains_the_queue_only_on_success() {
        let service = PersistenceService::open_in_memory().unwrap();
        service.record(EventKind::TaskCreated, "t1", json!({"id": "t1"}));
        assert_eq!(service.queued_len(), 1);
        service.flush().unwrap();
        assert_eq!(service.queued_len(), 0);
    }

    #[test]
    fn record_eagerly_flushes_once_the_queue_crosses_the_threshold() {
        let service = PersistenceService::open_in_memory().unwrap().with_flush_threshold(3);
        service.record(EventKind::TaskCreated, "t1", json!({"id": "t1"}));
        service.record(EventKind::TaskCreated, "t2", json!({"id": "t2"}));
        assert_eq!(service.queued_len(), 2);

        service.record(EventKind::TaskCreated, "t3", json!({"id": "t3"}));
        assert_eq!(service.queued_len(), 0, "crossing the threshold should have flushed the queue");
    }

    #[test]
    fn should_snapshot_is_true_once_unsnapshotted_events_cross_the_threshold() {
        let service = PersistenceService::open_in_memory().unwrap().with_snapshot_threshold(2);
        let t1 = Task::new("t1", "V", 1);
        service.record(EventKind::TaskCreated, "t1", task_to_payload(&t1).unwrap());
        service.flush().unwrap();
        assert!(!service.should_snapshot());

        let t2 = Task::new("t2", "W", 1);
        service.record(EventKind::TaskCreated, "t2", task_to_payload(&t2).unwrap());
        service.flush().unwrap();
        assert!(service.should_snapshot());

        service.snapshot(&[t1, t2], &Calendar::default(), &[]).unwrap();
        assert!(!service.should_snapshot(), "taking the snapshot should reset the threshold");
    }

    #[tokio::test]
    async fn snapshot_timer_snapshots_on_an_interval() {
        let service = Arc::new(PersistenceService::open_in_memory().unwrap());
        let t1 = Task::new("t1", "V", 1);
        service.record(EventKind::TaskCreated, "t1", task_to_payload(&t1).unwrap());
        service.flush().unwrap();

        let tasks = vec![t1.clone()];
        let handle = spawn_snapshot_timer(Arc::clone(&service), Duration::from_millis(20), move || {
            (tasks.clone(), Calendar::default(), Vec::new())
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert!(service.latest_snapshot().unwrap().is_some());
    }

    #[tokio::test]
    async fn snapshot_timer_snapshots_early_once_the_threshold_is_crossed() {
        let service = Arc::new(PersistenceService::open_in_memory().unwrap().with_snapshot_threshold(1));
        let t1 = Task::new("t1", "V", 1);
        service.record(EventKind::TaskCreated, "t1", task_to_payload(&t1).unwrap());
        service.flush().unwrap();

        let tasks = vec![t1.clone()];
        // An interval far longer than the test should ever wait: only the
        // threshold check (polled every second at most) should trigger this.
        let handle = spawn_snapshot_timer(Arc::clone(&service), Duration::from_secs(3600), move || {
            (tasks.clone(), Calendar::default(), Vec::new())
        });

        tokio::time::sleep(Duration::from_millis(1100)).await;
        handle.abort();

        assert!(service.latest_snapshot().unwrap().is_some());
    }
}

//! Reactive state controller (spec §4.5): bridges UI-facing observable
//! streams to the single-threaded `pls-host` worker, applying optimistic
//! updates and rolling them back on a worker error.
//!
//! No teacher Rust equivalent exists — `main.rs`'s module doc-comment
//! names the original `ProjectController` (TypeScript) as the owner of
//! this behavior. Channel shape borrows the
//! `seanchatmangpt-knhk/rust/knhk-workflow-engine` sidecar's
//! channel-plus-typed-error idiom; `tokio::sync::watch` is the natural fit
//! for "latest-value" streams and `tokio::sync::broadcast` for the error
//! channel, both already pulled in via the teacher-aligned workspace
//! dependency table for the persistence layer's async flush loop.

pub mod history;

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use pls_core::{ordering, Calendar, Task, TaskPatch, Variance};
use pls_engine::CalcStats;
use pls_host::{Command, Response, WorkerHost};
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};

use history::{History, Snapshot, DEFAULT_CAPACITY};

/// Where a moved task lands relative to `targetId` (spec §6 "Mutation API"
/// `move(ids, targetId, position)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePosition {
    Before,
    After,
    Child,
}

/// `tasks`' subset with `parent_id == parent_id`, ordered by
/// `ordering::sibling_order_key` — the order `indent`/`outdent`/`move` walk
/// to find a task's neighbors.
fn sorted_siblings(tasks: &[Task], parent_id: Option<&str>) -> Vec<Task> {
    let mut siblings: Vec<Task> = tasks.iter().filter(|t| t.parent_id.as_deref() == parent_id).cloned().collect();
    siblings.sort_by(|a, b| {
        ordering::sibling_order_key(a.parent_id.as_deref(), &a.sort_key)
            .cmp(&ordering::sibling_order_key(b.parent_id.as_deref(), &b.sort_key))
    });
    siblings
}

/// Depth-first pre-order flattening of the hierarchy — the order rows are
/// visible to a renderer (spec §6 `getVisibleRowNumber`), including blank
/// and phantom rows (spec §3: they're layout-only, not scheduling-only).
fn flatten_visible_order(tasks: &[Task]) -> Vec<String> {
    fn visit(task: &Task, tasks: &[Task], order: &mut Vec<String>) {
        order.push(task.id.clone());
        for child in sorted_siblings(tasks, Some(task.id.as_str())) {
            visit(&child, tasks, order);
        }
    }

    let mut order = Vec::with_capacity(tasks.len());
    for root in sorted_siblings(tasks, None) {
        visit(&root, tasks, &mut order);
    }
    order
}

/// Observable "latest value" streams plus the mutation surface described in
/// spec §4.5.
pub struct Controller {
    host: WorkerHost,
    tasks_tx: watch::Sender<Vec<Task>>,
    calendar_tx: watch::Sender<Calendar>,
    stats_tx: watch::Sender<CalcStats>,
    is_calculating_tx: watch::Sender<bool>,
    error_tx: broadcast::Sender<String>,
    history: StdMutex<History>,
    pending_patches: StdMutex<HashMap<String, TaskPatch>>,
    /// Serializes dispatch to the worker host, modeling spec §5's "the
    /// worker processes commands one at a time" from the controller side.
    dispatch_lock: AsyncMutex<()>,
}

impl Controller {
    pub fn new(host: WorkerHost) -> Self {
        let (tasks_tx, _) = watch::channel(Vec::new());
        let (calendar_tx, _) = watch::channel(Calendar::default());
        let (stats_tx, _) = watch::channel(CalcStats::empty());
        let (is_calculating_tx, _) = watch::channel(false);
        let (error_tx, _) = broadcast::channel(64);

        Controller {
            host,
            tasks_tx,
            calendar_tx,
            stats_tx,
            is_calculating_tx,
            error_tx,
            history: StdMutex::new(History::new(DEFAULT_CAPACITY)),
            pending_patches: StdMutex::new(HashMap::new()),
            dispatch_lock: AsyncMutex::new(()),
        }
    }

    pub fn subscribe_tasks(&self) -> watch::Receiver<Vec<Task>> {
        self.tasks_tx.subscribe()
    }

    pub fn subscribe_calendar(&self) -> watch::Receiver<Calendar> {
        self.calendar_tx.subscribe()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<CalcStats> {
        self.stats_tx.subscribe()
    }

    pub fn subscribe_is_calculating(&self) -> watch::Receiver<bool> {
        self.is_calculating_tx.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.error_tx.subscribe()
    }

    pub fn current_tasks(&self) -> Vec<Task> {
        self.tasks_tx.borrow().clone()
    }

    pub fn current_calendar(&self) -> Calendar {
        self.calendar_tx.borrow().clone()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.current_tasks(),
            calendar: self.current_calendar(),
        }
    }

    fn checkpoint(&self) {
        self.history.lock().unwrap().checkpoint(self.snapshot());
    }

    fn restore(&self, snapshot: Snapshot) {
        let _ = self.tasks_tx.send(snapshot.tasks);
        let _ = self.calendar_tx.send(snapshot.calendar);
    }

    fn publish_error(&self, message: String) {
        tracing::warn!(%message, "controller surfacing worker error");
        let _ = self.error_tx.send(message);
    }

    /// Run `command` on the worker host off the async executor's thread,
    /// applying the result to the streams or rolling back on failure.
    async fn dispatch(&self, command: Command, pre_image: Snapshot) {
        let _guard = self.dispatch_lock.lock().await;
        let _ = self.is_calculating_tx.send(true);

        // WorkerHost::dispatch is a blocking mpsc round-trip; run it on a
        // blocking-pool thread so it never stalls the async runtime.
        let host = &self.host;
        let response = tokio::task::block_in_place(|| host.dispatch(command));

        let _ = self.is_calculating_tx.send(false);

        match response {
            Response::CalculationResult { tasks, stats } | Response::TasksSynced { tasks, stats } => {
                let _ = self.tasks_tx.send(tasks);
                let _ = self.stats_tx.send(stats);
            }
            Response::Initialized | Response::Ready => {}
            Response::Error { message } => {
                self.restore(pre_image);
                self.publish_error(message);
            }
        }
    }

    pub async fn initialize(&self, tasks: Vec<Task>, calendar: Calendar) {
        let pre_image = self.snapshot();
        self.checkpoint();
        let _ = self.tasks_tx.send(tasks.clone());
        let _ = self.calendar_tx.send(calendar.clone());
        self.dispatch(Command::Initialize { tasks, calendar }, pre_image).await;
    }

    pub async fn add_task(&self, task: Task) {
        let pre_image = self.snapshot();
        self.checkpoint();
        let mut optimistic = self.current_tasks();
        optimistic.push(task.clone());
        let _ = self.tasks_tx.send(optimistic);
        self.dispatch(Command::AddTask { task }, pre_image).await;
    }

    /// Applies `patch` optimistically and enqueues `UPDATE_TASK`. A patch
    /// arriving for an id with another patch already queued (not yet
    /// dispatched) is merged client-side per spec §4.5 "Backpressure"
    /// rather than sent as two separate commands.
    pub async fn update_task(&self, id: impl Into<String>, patch: TaskPatch) {
        let id = id.into();
        let merged = {
            let mut pending = self.pending_patches.lock().unwrap();
            let merged = match pending.remove(&id) {
                Some(existing) => existing.merge(patch),
                None => patch,
            };
            pending.insert(id.clone(), merged.clone());
            merged
        };

        let pre_image = self.snapshot();
        self.checkpoint();
        let mut optimistic = self.current_tasks();
        if let Some(task) = optimistic.iter_mut().find(|t| t.id == id) {
            merged.apply_to(task);
        }
        let _ = self.tasks_tx.send(optimistic);

        let patch_to_send = {
            let mut pending = self.pending_patches.lock().unwrap();
            pending.remove(&id).unwrap_or_else(|| merged.clone())
        };
        self.dispatch(Command::UpdateTask { id, patch: patch_to_send }, pre_image).await;
    }

    pub async fn delete_task(&self, id: impl Into<String>) {
        let id = id.into();
        let pre_image = self.snapshot();
        self.checkpoint();
        let optimistic: Vec<Task> = self.current_tasks().into_iter().filter(|t| t.id != id).collect();
        let _ = self.tasks_tx.send(optimistic);
        self.dispatch(Command::DeleteTask { id }, pre_image).await;
    }

    pub async fn sync_tasks(&self, tasks: Vec<Task>) {
        let pre_image = self.snapshot();
        self.checkpoint();
        let _ = self.tasks_tx.send(tasks.clone());
        self.dispatch(Command::SyncTasks { tasks }, pre_image).await;
    }

    pub async fn update_calendar(&self, calendar: Calendar) {
        let pre_image = self.snapshot();
        self.checkpoint();
        let _ = self.calendar_tx.send(calendar.clone());
        self.dispatch(Command::UpdateCalendar { calendar }, pre_image).await;
    }

    /// Dropped while a calculation is already in flight (spec §4.5
    /// "`CALCULATE` commands are dropped while one is pending").
    pub async fn force_recalculate(&self) {
        if *self.is_calculating_tx.subscribe().borrow() {
            return;
        }
        let pre_image = self.snapshot();
        self.dispatch(Command::Calculate, pre_image).await;
    }

    pub async fn undo(&self) -> bool {
        let popped = {
            let mut history = self.history.lock().unwrap();
            history.undo(self.snapshot())
        };
        let Some(snapshot) = popped else { return false };
        self.restore(snapshot.clone());
        self.dispatch(
            Command::SyncTasks { tasks: snapshot.tasks },
            self.snapshot(),
        )
        .await;
        true
    }

    pub async fn redo(&self) -> bool {
        let popped = {
            let mut history = self.history.lock().unwrap();
            history.redo(self.snapshot())
        };
        let Some(snapshot) = popped else { return false };
        self.restore(snapshot.clone());
        self.dispatch(
            Command::SyncTasks { tasks: snapshot.tasks },
            self.snapshot(),
        )
        .await;
        true
    }

    /// Read helpers (spec §6 "Consumer API").
    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.current_tasks().into_iter().find(|t| t.id == id)
    }

    pub fn get_children(&self, id: &str) -> Vec<Task> {
        self.current_tasks()
            .into_iter()
            .filter(|t| t.parent_id.as_deref() == Some(id))
            .collect()
    }

    /// 1-based position of `task` in the flattened, depth-first hierarchy
    /// order (spec §6 `getVisibleRowNumber`). `None` if `task` is no longer
    /// (or never was) part of the current project.
    pub fn get_visible_row_number(&self, task: &Task) -> Option<usize> {
        let tasks = self.current_tasks();
        flatten_visible_order(&tasks).iter().position(|id| id == &task.id).map(|i| i + 1)
    }

    /// Signed working-day variance between `id`'s baseline and
    /// actual-if-known-else-projected dates (spec §6 `calculateVariance`).
    pub fn calculate_variance(&self, id: &str) -> Option<Variance> {
        let task = self.get_task(id)?;
        Some(pls_core::calculate_variance(&task, &self.current_calendar()))
    }

    /// Make `id` a child of its preceding sibling, appended after that
    /// sibling's existing children (spec §6 "Mutation API" `indent`). A
    /// no-op if `id` has no preceding sibling to indent under.
    pub async fn indent(&self, id: impl Into<String>) {
        let id = id.into();
        let tasks = self.current_tasks();
        let Some(task) = tasks.iter().find(|t| t.id == id) else { return };
        let siblings = sorted_siblings(&tasks, task.parent_id.as_deref());
        let Some(position) = siblings.iter().position(|t| t.id == id) else { return };
        let Some(new_parent) = position.checked_sub(1).map(|i| siblings[i].clone()) else { return };

        let new_parent_children = sorted_siblings(&tasks, Some(new_parent.id.as_str()));
        let last_key = new_parent_children.last().map(|t| t.sort_key.as_str());
        let Ok(sort_key) = ordering::generate_append_key(last_key) else { return };

        let patch = TaskPatch {
            parent_id: Some(Some(new_parent.id)),
            sort_key: Some(sort_key),
            ..Default::default()
        };
        self.update_task(id, patch).await;
    }

    /// Move `id` out of its parent, placing it immediately after that
    /// former parent among the grandparent's children (spec §6 "Mutation
    /// API" `outdent`). A no-op if `id` is already top-level.
    pub async fn outdent(&self, id: impl Into<String>) {
        let id = id.into();
        let tasks = self.current_tasks();
        let Some(task) = tasks.iter().find(|t| t.id == id) else { return };
        let Some(parent_id) = task.parent_id.clone() else { return };
        let Some(parent) = tasks.iter().find(|t| t.id == parent_id).cloned() else { return };

        let grandparent_id = parent.parent_id.clone();
        let grandparent_siblings = sorted_siblings(&tasks, grandparent_id.as_deref());
        let next_key = grandparent_siblings
            .iter()
            .position(|t| t.id == parent.id)
            .and_then(|i| grandparent_siblings.get(i + 1))
            .map(|t| t.sort_key.as_str());
        let Ok(sort_key) = ordering::generate_between(Some(parent.sort_key.as_str()), next_key) else { return };

        let patch = TaskPatch {
            parent_id: Some(grandparent_id),
            sort_key: Some(sort_key),
            ..Default::default()
        };
        self.update_task(id, patch).await;
    }

    /// Relocate `ids`, in order, to `position` relative to `target_id`
    /// (spec §6 "Mutation API" `move(ids, targetId, position)`). Grouped
    /// into a single undo step (spec §4.6 composite) since this is
    /// logically one user gesture regardless of how many tasks it touches.
    pub async fn move_tasks(&self, ids: Vec<String>, target_id: impl Into<String>, position: MovePosition) {
        let target_id = target_id.into();
        let tasks = self.current_tasks();
        let Some(target) = tasks.iter().find(|t| t.id == target_id).cloned() else { return };
        let ids: Vec<String> = ids.into_iter().filter(|id| *id != target_id).collect();
        if ids.is_empty() {
            return;
        }

        let (new_parent, lower_bound, upper_bound) = match position {
            MovePosition::Child => {
                let children = sorted_siblings(&tasks, Some(target.id.as_str()));
                (Some(target.id.clone()), children.last().map(|t| t.sort_key.clone()), None)
            }
            MovePosition::Before => {
                let siblings = sorted_siblings(&tasks, target.parent_id.as_deref());
                let position = siblings.iter().position(|t| t.id == target.id).unwrap_or(0);
                let prev = position.checked_sub(1).and_then(|i| siblings.get(i)).map(|t| t.sort_key.clone());
                (target.parent_id.clone(), prev, Some(target.sort_key.clone()))
            }
            MovePosition::After => {
                let siblings = sorted_siblings(&tasks, target.parent_id.as_deref());
                let position = siblings.iter().position(|t| t.id == target.id).unwrap_or(0);
                let next = siblings.get(position + 1).map(|t| t.sort_key.clone());
                (target.parent_id.clone(), Some(target.sort_key.clone()), next)
            }
        };

        let opening = self.snapshot();
        self.history.lock().unwrap().begin_composite(opening);

        let mut lower = lower_bound;
        for id in ids {
            match ordering::generate_between(lower.as_deref(), upper_bound.as_deref()) {
                Ok(sort_key) => {
                    lower = Some(sort_key.clone());
                    let patch = TaskPatch {
                        parent_id: Some(new_parent.clone()),
                        sort_key: Some(sort_key),
                        ..Default::default()
                    };
                    self.update_task(id, patch).await;
                }
                Err(error) => tracing::warn!(%error, %id, "skipping move for task; could not generate a sort key"),
            }
        }

        self.history.lock().unwrap().end_composite();
    }
}

//! In-memory project state owned by the worker thread.
//!
//! Grounded in `engine_state.rs`'s `ProjectState` (`tasks`, `task_order`,
//! `calendar`, `initialized`), replacing its free-form
//! `serde_json::Value` field merge with `TaskPatch::apply_to`.

use pls_core::{Calendar, Task, TaskPatch};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("task {0:?} not found")]
    UnknownTask(String),
    #[error("task {0:?} already exists")]
    DuplicateTask(String),
}

#[derive(Debug, Default)]
pub struct ProjectState {
    tasks: Vec<Task>,
    calendar: Calendar,
    initialized: bool,
}

impl ProjectState {
    pub fn new() -> Self {
        ProjectState {
            tasks: Vec::new(),
            calendar: Calendar::default(),
            initialized: false,
        }
    }

    pub fn initialize(&mut self, tasks: Vec<Task>, calendar: Calendar) {
        self.tasks = tasks;
        self.calendar = calendar;
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn add_task(&mut self, task: Task) -> Result<(), StateError> {
        if self.tasks.iter().any(|t| t.id == task.id) {
            return Err(StateError::DuplicateTask(task.id));
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<(), StateError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StateError::UnknownTask(id.to_string()))?;
        patch.apply_to(task);
        Ok(())
    }

    pub fn delete_task(&mut self, id: &str) -> Result<(), StateError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Err(StateError::UnknownTask(id.to_string()));
        }
        // Orphaned children keep the deleted id as parent_id; the
        // controller is responsible for re-parenting or cascading delete
        // before issuing this command (spec §6 mutation API is the
        // controller's surface, not the host's).
        Ok(())
    }

    pub fn sync_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn set_calendar(&mut self, calendar: Calendar) {
        self.calendar = calendar;
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.calendar = Calendar::default();
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pls_core::Task;

    #[test]
    fn add_then_delete_round_trips() {
        let mut state = ProjectState::new();
        state.add_task(Task::new("a", "V", 1)).unwrap();
        assert_eq!(state.tasks().len(), 1);
        state.delete_task("a").unwrap();
        assert!(state.tasks().is_empty());
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut state = ProjectState::new();
        state.add_task(Task::new("a", "V", 1)).unwrap();
        assert!(matches!(
            state.add_task(Task::new("a", "V", 1)),
            Err(StateError::DuplicateTask(_))
        ));
    }

    #[test]
    fn update_unknown_task_errors() {
        let mut state = ProjectState::new();
        assert!(matches!(
            state.update_task("missing", &TaskPatch::default()),
            Err(StateError::UnknownTask(_))
        ));
    }
}

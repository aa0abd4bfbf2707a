//! Command/response surface (spec §4.4), grounded in `commands.rs`'s Tauri
//! command set (`initialize_engine`, `update_engine_task`, `add_engine_task`,
//! `delete_engine_task`, `sync_engine_tasks`, `calculate_cpm`,
//! `get_engine_status`, `clear_engine`).

use pls_core::{Calendar, Task, TaskPatch};
use pls_engine::CalcStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Initialize { tasks: Vec<Task>, calendar: Calendar },
    AddTask { task: Task },
    UpdateTask { id: String, patch: TaskPatch },
    DeleteTask { id: String },
    SyncTasks { tasks: Vec<Task> },
    UpdateCalendar { calendar: Calendar },
    Calculate,
    Dispose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ready,
    Initialized,
    CalculationResult { tasks: Vec<Task>, stats: CalcStats },
    TasksSynced { tasks: Vec<Task>, stats: CalcStats },
    Error { message: String },
}

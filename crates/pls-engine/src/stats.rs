//! Calculation outputs (spec §4.3: "project-level statistics
//! `(calcTime, taskCount, criticalCount, projectEnd)`"), generalizing the
//! teacher's `CPMResult`/`CPMStats` (`src-tauri/src/types.rs`).

use chrono::NaiveDate;
use pls_core::Task;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcStats {
    pub calc_time_ms: f64,
    pub task_count: usize,
    pub critical_count: usize,
    #[serde(default)]
    pub project_end: Option<NaiveDate>,
    /// Project duration in working days, leaf-task span start to end.
    pub project_duration: i64,
    /// Non-fatal warnings accumulated during this pass (spec §4.3 "Edge
    /// policies", §7 "Iteration-limit", "Graph-integrity").
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Set when the calculation could not complete at all (spec §7
    /// "Worker error" / corrupt-calendar case); `tasks` in the sibling
    /// `CalcResult` is then the unchanged input.
    #[serde(default)]
    pub error: Option<String>,
}

impl CalcStats {
    pub fn empty() -> Self {
        CalcStats {
            calc_time_ms: 0.0,
            task_count: 0,
            critical_count: 0,
            project_end: None,
            project_duration: 0,
            warnings: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcResult {
    pub tasks: Vec<Task>,
    pub stats: CalcStats,
}

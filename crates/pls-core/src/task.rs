//! The scheduling domain model (spec §3), grounded in
//! `src-tauri/src/types.rs`.

use serde::{Deserialize, Serialize};

/// Dependency link type between predecessor and successor (spec §3, §GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Finish-to-start: successor starts the work-day after predecessor
    /// finishes + lag.
    FS,
    /// Start-to-start: successor starts on predecessor.start + lag.
    SS,
    /// Finish-to-finish: successor finishes on predecessor.end + lag.
    FF,
    /// Start-to-finish: successor finishes on predecessor.start + lag.
    SF,
}

impl Default for LinkType {
    fn default() -> Self {
        LinkType::FS
    }
}

/// A single dependency edge: `(predecessorId, linkType, lag)` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Predecessor task id.
    pub id: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    /// Signed working-day offset.
    pub lag: i32,
}

/// Hard bound on a task's start or finish (spec §3, §GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    /// No bound; the default.
    Asap,
    /// Start no earlier than `constraintDate`.
    Snet,
    /// Start no later than `constraintDate`.
    Snlt,
    /// Finish no earlier than `constraintDate`.
    Fnet,
    /// Finish no later than `constraintDate` (may force negative float if
    /// infeasible — spec §9 Open Question, intentionally not "fixed").
    Fnlt,
    /// Must finish on `constraintDate`; start derived, bypasses
    /// dependency-driven scheduling.
    Mfo,
}

impl Default for ConstraintType {
    fn default() -> Self {
        ConstraintType::Asap
    }
}

/// Auto: CPM calculates dates from dependencies. Manual: user-fixed dates,
/// engine does not recompute them (though they still act as predecessors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingMode {
    Auto,
    Manual,
}

impl Default for SchedulingMode {
    fn default() -> Self {
        SchedulingMode::Auto
    }
}

/// Blank rows are layout placeholders; phantom rows are similarly excluded
/// from scheduling (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowType {
    Task,
    Blank,
    Phantom,
}

impl Default for RowType {
    fn default() -> Self {
        RowType::Task
    }
}

impl RowType {
    pub fn participates_in_scheduling(self) -> bool {
        matches!(self, RowType::Task)
    }
}

/// Health indicator surfaced to renderers; derived from float/progress, not
/// an independent input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskHealth {
    OnTrack,
    AtRisk,
    Critical,
}

/// The unit of scheduling (spec §3 "Task").
///
/// Field names are `camelCase` on the wire, matching the teacher's
/// JS-interop convention (`src-tauri/src/types.rs`), now reused for the
/// event-log/snapshot payloads and the native project file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: String,

    pub parent_id: Option<String>,
    pub sort_key: String,

    #[serde(default)]
    pub row_type: RowType,

    /// Leaf: required. Parent: derived, ignored on input (overwritten every
    /// calculation pass).
    pub duration: i32,

    /// `None` before first calculation.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    #[serde(default)]
    pub constraint_type: ConstraintType,
    #[serde(default)]
    pub constraint_date: Option<String>,

    #[serde(default)]
    pub scheduling_mode: SchedulingMode,

    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub notes: String,

    // --- tracking fields: reporting only, never CPM inputs ---
    #[serde(default)]
    pub actual_start: Option<String>,
    #[serde(default)]
    pub actual_finish: Option<String>,
    #[serde(default)]
    pub remaining_duration: Option<i32>,
    #[serde(default)]
    pub baseline_start: Option<String>,
    #[serde(default)]
    pub baseline_finish: Option<String>,
    #[serde(default)]
    pub baseline_duration: Option<i32>,

    // --- calculated outputs: rewritten on every CPM pass ---
    #[serde(default)]
    pub early_start: Option<String>,
    #[serde(default)]
    pub early_finish: Option<String>,
    #[serde(default)]
    pub late_start: Option<String>,
    #[serde(default)]
    pub late_finish: Option<String>,
    #[serde(default)]
    pub total_float: Option<i64>,
    #[serde(default)]
    pub free_float: Option<i64>,
    #[serde(default)]
    pub is_critical: Option<bool>,
    #[serde(default)]
    pub health: Option<TaskHealth>,
}

impl Task {
    /// A minimal auto-scheduled leaf task, useful for tests and for seeding
    /// a controller `addTask` call before the caller fills in the rest.
    pub fn new(id: impl Into<String>, sort_key: impl Into<String>, duration: i32) -> Self {
        Task {
            id: id.into(),
            name: String::new(),
            parent_id: None,
            sort_key: sort_key.into(),
            row_type: RowType::Task,
            duration,
            start: None,
            end: None,
            dependencies: Vec::new(),
            constraint_type: ConstraintType::Asap,
            constraint_date: None,
            scheduling_mode: SchedulingMode::Auto,
            progress: 0,
            notes: String::new(),
            actual_start: None,
            actual_finish: None,
            remaining_duration: None,
            baseline_start: None,
            baseline_finish: None,
            baseline_duration: None,
            early_start: None,
            early_finish: None,
            late_start: None,
            late_finish: None,
            total_float: None,
            free_float: None,
            is_critical: None,
            health: None,
        }
    }

    pub fn participates_in_scheduling(&self) -> bool {
        self.row_type.participates_in_scheduling()
    }

    pub fn is_manual(&self) -> bool {
        self.scheduling_mode == SchedulingMode::Manual
    }
}

/// A partial update to a task (spec §4.4 `UPDATE_TASK`): only present
/// fields are merged, generalizing the teacher's free-form
/// `update_task(&str, serde_json::Value)` field-matching into a typed
/// struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_type: Option<RowType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Dependency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_type: Option<ConstraintType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_date: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_mode: Option<SchedulingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_finish: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_duration: Option<Option<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_start: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_finish: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_duration: Option<Option<i32>>,
}

impl TaskPatch {
    /// Apply this patch to `task` in place, touching only present fields.
    pub fn apply_to(&self, task: &mut Task) {
        macro_rules! merge {
            ($field:ident) => {
                if let Some(v) = self.$field.clone() {
                    task.$field = v;
                }
            };
        }
        merge!(name);
        merge!(parent_id);
        merge!(sort_key);
        merge!(row_type);
        merge!(duration);
        merge!(start);
        merge!(end);
        merge!(dependencies);
        merge!(constraint_type);
        merge!(constraint_date);
        merge!(scheduling_mode);
        merge!(progress);
        merge!(notes);
        merge!(actual_start);
        merge!(actual_finish);
        merge!(remaining_duration);
        merge!(baseline_start);
        merge!(baseline_finish);
        merge!(baseline_duration);
    }

    /// Merge backpressure-coalesced successive patches to the same task:
    /// `other` was issued after `self`, so its fields win on conflict
    /// (spec §4.5 "Backpressure" — "two successive UPDATE_TASK on the same
    /// id are merged client-side into one").
    pub fn merge(mut self, other: TaskPatch) -> TaskPatch {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(name);
        take!(parent_id);
        take!(sort_key);
        take!(row_type);
        take!(duration);
        take!(start);
        take!(end);
        take!(dependencies);
        take!(constraint_type);
        take!(constraint_date);
        take!(scheduling_mode);
        take!(progress);
        take!(notes);
        take!(actual_start);
        take!(actual_finish);
        take!(remaining_duration);
        take!(baseline_start);
        take!(baseline_finish);
        take!(baseline_duration);
        self
    }
}

/// Difference between baseline and actual/projected dates (spec §6
/// `calculateVariance`), in signed working days (positive = late).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variance {
    pub start_variance_days: Option<i64>,
    pub finish_variance_days: Option<i64>,
}

/// Signed working-day variance between a task's baseline and its
/// actual-if-known-else-projected dates (spec §6 "Consumer API"
/// `calculateVariance(task)`). `None` for a side whose baseline or
/// actual/projected date isn't set yet.
pub fn calculate_variance(task: &Task, calendar: &crate::calendar::Calendar) -> Variance {
    let start_variance_days = variance_days(
        calendar,
        task.baseline_start.as_deref(),
        task.actual_start.as_deref().or(task.start.as_deref()),
    );
    let finish_variance_days = variance_days(
        calendar,
        task.baseline_finish.as_deref(),
        task.actual_finish.as_deref().or(task.end.as_deref()),
    );
    Variance { start_variance_days, finish_variance_days }
}

fn variance_days(calendar: &crate::calendar::Calendar, baseline: Option<&str>, actual_or_projected: Option<&str>) -> Option<i64> {
    let baseline_date = crate::calendar::parse_date(baseline?).ok()?;
    let actual_date = crate::calendar::parse_date(actual_or_projected?).ok()?;
    Some(calendar.work_days_difference(baseline_date, actual_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_patch_only_touches_present_fields() {
        let mut task = Task::new("t1", "a", 3);
        task.name = "Original".into();
        task.progress = 10;

        let patch = TaskPatch {
            progress: Some(50),
            ..Default::default()
        };
        patch.apply_to(&mut task);

        assert_eq!(task.name, "Original");
        assert_eq!(task.progress, 50);
    }

    #[test]
    fn task_patch_can_clear_optional_fields() {
        let mut task = Task::new("t1", "a", 3);
        task.constraint_date = Some("2024-01-01".into());

        let patch = TaskPatch {
            constraint_date: Some(None),
            ..Default::default()
        };
        patch.apply_to(&mut task);

        assert_eq!(task.constraint_date, None);
    }

    #[test]
    fn successive_patches_merge_with_later_winning() {
        let p1 = TaskPatch {
            name: Some("First".into()),
            progress: Some(10),
            ..Default::default()
        };
        let p2 = TaskPatch {
            progress: Some(20),
            ..Default::default()
        };
        let merged = p1.merge(p2);
        assert_eq!(merged.name, Some("First".into()));
        assert_eq!(merged.progress, Some(20));
    }

    #[test]
    fn serde_round_trip_preserves_input_fields() {
        let mut task = Task::new("t1", "a", 5);
        task.constraint_date = None;
        task.actual_start = None;
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(task, back);
    }

    #[test]
    fn variance_prefers_actual_over_projected_start() {
        let calendar = crate::calendar::Calendar::default();
        let mut task = Task::new("t1", "a", 3);
        task.baseline_start = Some("2024-01-01".into());
        task.start = Some("2024-01-03".into());
        task.actual_start = Some("2024-01-04".into());

        let variance = calculate_variance(&task, &calendar);
        assert_eq!(variance.start_variance_days, Some(3));
    }

    #[test]
    fn variance_falls_back_to_projected_finish_when_not_actual() {
        let calendar = crate::calendar::Calendar::default();
        let mut task = Task::new("t1", "a", 3);
        task.baseline_finish = Some("2024-01-01".into());
        task.end = Some("2024-01-02".into());

        let variance = calculate_variance(&task, &calendar);
        assert_eq!(variance.finish_variance_days, Some(1));
    }

    #[test]
    fn variance_is_none_without_a_baseline() {
        let calendar = crate::calendar::Calendar::default();
        let mut task = Task::new("t1", "a", 3);
        task.start = Some("2024-01-03".into());

        let variance = calculate_variance(&task, &calendar);
        assert_eq!(variance.start_variance_days, None);
    }
}

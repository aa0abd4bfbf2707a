//! The CPM scheduling engine. Pure function of `(tasks, calendar)` to a
//! dated, floated, critical-path-marked task set plus statistics — no I/O,
//! no persistence, no notion of a "current project" beyond its arguments.
//! `pls-host` owns the stateful wrapper that feeds this engine a command
//! stream.

mod cpm;
mod hierarchy;
mod stats;

pub use cpm::{calculate, calculate_with_limit, DEFAULT_MAX_ITERATIONS};
pub use stats::{CalcResult, CalcStats};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pls_core::{Calendar, ConstraintType, Dependency, LinkType, SchedulingMode, Task};

    fn d(s: &str) -> String {
        s.to_string()
    }

    fn leaf(id: &str, duration: i32) -> Task {
        Task::new(id, "V", duration)
    }

    fn fs(pred: &str, lag: i32) -> Dependency {
        Dependency {
            id: pred.to_string(),
            link_type: LinkType::FS,
            lag,
        }
    }

    #[test]
    fn empty_project_returns_zeroed_stats() {
        let result = calculate(&[], &Calendar::default());
        assert!(result.tasks.is_empty());
        assert_eq!(result.stats.task_count, 0);
        assert_eq!(result.stats.critical_count, 0);
    }

    /// S1 — linear FS chain.
    #[test]
    fn s1_linear_fs_chain() {
        let cal = Calendar::default();
        let mut a = leaf("A", 3);
        a.start = Some(d("2024-01-01"));
        let mut b = leaf("B", 2);
        b.dependencies.push(fs("A", 0));
        let mut c = leaf("C", 1);
        c.dependencies.push(fs("B", 0));

        let result = calculate(&[a, b, c], &cal);
        let by_id = |id: &str| result.tasks.iter().find(|t| t.id == id).unwrap();

        assert_eq!(by_id("A").end.as_deref(), Some("2024-01-03"));
        assert_eq!(by_id("B").start.as_deref(), Some("2024-01-04"));
        assert_eq!(by_id("B").end.as_deref(), Some("2024-01-05"));
        assert_eq!(by_id("C").start.as_deref(), Some("2024-01-08"));
        assert_eq!(by_id("C").end.as_deref(), Some("2024-01-08"));
        for id in ["A", "B", "C"] {
            assert_eq!(by_id(id).total_float, Some(0));
            assert_eq!(by_id(id).is_critical, Some(true));
        }
    }

    /// S2 — calendar skip.
    #[test]
    fn s2_calendar_skip() {
        let cal = Calendar::default();
        let mut a = leaf("A", 3);
        a.start = Some(d("2024-01-04"));
        let mut b = leaf("B", 2);
        b.dependencies.push(fs("A", 0));
        let mut c = leaf("C", 1);
        c.dependencies.push(fs("B", 0));

        let result = calculate(&[a, b, c], &cal);
        let by_id = |id: &str| result.tasks.iter().find(|t| t.id == id).unwrap();

        assert_eq!(by_id("A").end.as_deref(), Some("2024-01-08"));
        assert_eq!(by_id("B").start.as_deref(), Some("2024-01-09"));
        assert_eq!(by_id("B").end.as_deref(), Some("2024-01-10"));
        assert_eq!(by_id("C").start.as_deref(), Some("2024-01-11"));
    }

    /// S3 — SS with lag.
    #[test]
    fn s3_ss_with_lag() {
        let cal = Calendar::default();
        let mut a = leaf("A", 5);
        a.start = Some(d("2024-01-01"));
        let mut b = leaf("B", 3);
        b.dependencies.push(Dependency {
            id: "A".into(),
            link_type: LinkType::SS,
            lag: 2,
        });

        let result = calculate(&[a, b], &cal);
        let by_id = |id: &str| result.tasks.iter().find(|t| t.id == id).unwrap();
        assert_eq!(by_id("B").start.as_deref(), Some("2024-01-03"));
        assert_eq!(by_id("B").end.as_deref(), Some("2024-01-05"));
    }

    /// S4 — FNLT infeasible: deliberately produces negative float, per the
    /// explicit Open Question decision not to "fix" this.
    #[test]
    fn s4_fnlt_infeasible_yields_negative_float() {
        let cal = Calendar::default();
        let mut a = leaf("A", 3);
        a.start = Some(d("2024-01-01"));
        let mut b = leaf("B", 5);
        b.dependencies.push(fs("A", 0));
        b.constraint_type = ConstraintType::Fnlt;
        b.constraint_date = Some(d("2024-01-05"));

        let result = calculate(&[a, b], &cal);
        let by_id = |id: &str| result.tasks.iter().find(|t| t.id == id).unwrap();
        let b_result = by_id("B");
        assert!(b_result.total_float.unwrap() < 0);
        assert_eq!(b_result.is_critical, Some(true));
    }

    /// S5 — parent rollup.
    #[test]
    fn s5_parent_rollup() {
        let cal = Calendar::default();
        let mut p = leaf("P", 0);
        p.row_type = pls_core::RowType::Task;
        let mut x = leaf("X", 2);
        x.parent_id = Some("P".into());
        x.start = Some(d("2024-01-02"));
        let mut y = leaf("Y", 4);
        y.parent_id = Some("P".into());
        y.start = Some(d("2024-01-03"));

        let result = calculate(&[p, x, y], &cal);
        let by_id = |id: &str| result.tasks.iter().find(|t| t.id == id).unwrap();

        assert_eq!(by_id("P").start.as_deref(), Some("2024-01-02"));
        assert_eq!(by_id("P").end.as_deref(), Some("2024-01-08"));
        assert_eq!(by_id("P").duration, 5);
    }

    #[test]
    fn negative_duration_is_coerced_to_zero() {
        let cal = Calendar::default();
        let mut a = leaf("A", -5);
        a.start = Some(d("2024-01-01"));
        let result = calculate(&[a], &cal);
        assert_eq!(result.tasks[0].end.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn unknown_predecessor_is_skipped_with_warning_not_abort() {
        let cal = Calendar::default();
        let mut b = leaf("B", 2);
        b.dependencies.push(fs("missing", 0));
        let result = calculate(&[b], &cal);
        assert!(!result.stats.warnings.is_empty());
        assert_eq!(result.tasks.len(), 1);
    }

    #[test]
    fn blank_rows_are_excluded_from_scheduling_and_stats() {
        let cal = Calendar::default();
        let mut a = leaf("A", 3);
        a.start = Some(d("2024-01-01"));
        let mut blank = leaf("blank1", 0);
        blank.row_type = pls_core::RowType::Blank;

        let result = calculate(&[a, blank], &cal);
        assert_eq!(result.stats.task_count, 2);
        let blank_result = result.tasks.iter().find(|t| t.id == "blank1").unwrap();
        assert_eq!(blank_result.is_critical, None);
    }

    #[test]
    fn manual_task_keeps_fixed_dates() {
        let cal = Calendar::default();
        let mut a = leaf("A", 3);
        a.scheduling_mode = SchedulingMode::Manual;
        a.start = Some(d("2024-06-10"));
        a.end = Some(d("2024-06-12"));

        let result = calculate(&[a], &cal);
        let manual = &result.tasks[0];
        assert_eq!(manual.start.as_deref(), Some("2024-06-10"));
        assert_eq!(manual.end.as_deref(), Some("2024-06-12"));
    }

    proptest::proptest! {
        #[test]
        fn prop_free_float_bounded_by_total_float(lag in -3i32..3) {
            let cal = Calendar::default();
            let mut a = leaf("A", 3);
            a.start = Some("2024-01-01".to_string());
            let mut b = leaf("B", 2);
            b.dependencies.push(fs("A", lag));
            let result = calculate(&[a, b], &cal);
            for t in &result.tasks {
                let tf = t.total_float.unwrap_or(0);
                let ff = t.free_float.unwrap_or(0);
                proptest::prop_assert!(ff >= 0);
                proptest::prop_assert!(ff <= tf);
            }
        }
    }
}

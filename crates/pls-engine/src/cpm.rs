//! CPM (Critical Path Method) calculation: forward pass, backward pass,
//! float, critical-path marking, hierarchical rollup.
//!
//! Grounded in `src-tauri/src/cpm.rs` (`forward_pass`, `calculate_parent_dates`,
//! `backward_pass`, `calculate_float`, `mark_critical_path`, `calculate`),
//! generalized from untyped `link_type`/`constraint_type` strings to the
//! `LinkType`/`ConstraintType` enums and from string dates to `NaiveDate`.

use std::collections::HashMap;

use chrono::NaiveDate;
use pls_core::{Calendar, ConstraintType, LinkType, SchedulingMode, Task, TaskHealth};

use crate::hierarchy::Hierarchy;
use crate::stats::{CalcResult, CalcStats};

/// Forward/backward passes give up after this many fixed-point iterations;
/// a circular dependency is the only realistic way to hit it (spec §4.3
/// "Edge policies"). The teacher bounds at 50; the spec raises the default
/// to 100.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

#[derive(Clone)]
struct SuccessorEdge {
    id: String,
    link_type: LinkType,
    lag: i32,
}

fn duration_offset(duration: i32) -> i64 {
    if duration <= 0 {
        0
    } else {
        (duration - 1) as i64
    }
}

fn build_successor_map(tasks: &[Task]) -> HashMap<String, Vec<SuccessorEdge>> {
    let mut map: HashMap<String, Vec<SuccessorEdge>> = HashMap::new();
    for task in tasks {
        map.entry(task.id.clone()).or_default();
    }
    for task in tasks {
        for dep in &task.dependencies {
            // A dependency on an id absent from this task set is skipped
            // with a warning by the caller; here we simply never see it as
            // a key, so `map.get` on the successor side naturally omits it.
            if let Some(entry) = map.get_mut(&dep.id) {
                entry.push(SuccessorEdge {
                    id: task.id.clone(),
                    link_type: dep.link_type,
                    lag: dep.lag,
                });
            }
        }
    }
    map
}

fn index_by_id(tasks: &[Task]) -> HashMap<String, usize> {
    tasks.iter().enumerate().map(|(i, t)| (t.id.clone(), i)).collect()
}

/// Forward pass: Early Start / Early Finish for leaf, auto-scheduled,
/// schedulable tasks (spec §4.3 step 2).
fn forward_pass(
    tasks: &mut [Task],
    calendar: &Calendar,
    hierarchy: &Hierarchy,
    max_iterations: usize,
    warnings: &mut Vec<String>,
) {
    let by_id = index_by_id(tasks);
    let mut iterations = 0usize;
    let mut changed = true;

    while changed && iterations < max_iterations {
        changed = false;
        iterations += 1;

        let snapshot: HashMap<String, (Option<NaiveDate>, Option<NaiveDate>)> = tasks
            .iter()
            .map(|t| (t.id.clone(), (t.start.as_deref().map(|s| calendar_date(s)), t.end.as_deref().map(|s| calendar_date(s)))))
            .collect();

        for i in 0..tasks.len() {
            let id = tasks[i].id.clone();
            if hierarchy.is_parent(&id) || !tasks[i].participates_in_scheduling() {
                continue;
            }
            if tasks[i].is_manual() {
                // Manual tasks keep user dates but still need early_start/
                // early_finish populated for float reporting downstream.
                if tasks[i].start.is_some() {
                    continue;
                }
            }

            let mut candidate: Option<NaiveDate> = None;
            for dep in tasks[i].dependencies.clone() {
                let Some(&pred_idx) = by_id.get(&dep.id) else {
                    warnings.push(format!(
                        "task {id:?} references unknown predecessor {:?}; dependency skipped",
                        dep.id
                    ));
                    continue;
                };
                let (pred_start, pred_end) = &snapshot[&tasks[pred_idx].id];
                let (Some(pred_start), Some(pred_end)) = (pred_start, pred_end) else {
                    continue;
                };
                let duration = tasks[i].duration.max(0);
                let derived = match dep.link_type {
                    LinkType::FS => calendar.add_work_days(*pred_end, 1 + dep.lag as i64),
                    LinkType::SS => calendar.add_work_days(*pred_start, dep.lag as i64),
                    LinkType::FF => calendar.add_work_days(*pred_end, dep.lag as i64 - duration_offset(duration)),
                    LinkType::SF => calendar.add_work_days(*pred_start, dep.lag as i64 - duration_offset(duration)),
                };
                candidate = Some(match candidate {
                    Some(current) if current >= derived => current,
                    _ => derived,
                });
            }

            let duration = tasks[i].duration.max(0);
            let mut final_start = apply_start_constraint(&tasks[i], calendar, candidate, duration);

            if tasks[i].constraint_type == ConstraintType::Mfo {
                if let Some(cd) = tasks[i].constraint_date.as_deref().map(calendar_date) {
                    let end = cd;
                    let start = calendar.add_work_days(cd, -duration_offset(duration));
                    set_dates(&mut tasks[i], start, end, &mut changed);
                    continue;
                }
            }

            if final_start.is_none() {
                final_start = tasks[i].start.as_deref().map(calendar_date);
            }

            if let Some(start) = final_start {
                let end = calendar.add_work_days(start, duration_offset(duration));
                set_dates(&mut tasks[i], start, end, &mut changed);
            }
        }
    }

    if iterations >= max_iterations {
        warnings.push(format!(
            "forward pass did not converge within {max_iterations} iterations; possible circular dependency"
        ));
    }
}

fn calendar_date(s: &str) -> NaiveDate {
    pls_core::calendar::parse_date(s).unwrap_or_else(|_| {
        // Boundary validation (spec §4.1 "Failure") is the caller's job;
        // a date that reaches this point already round-tripped through
        // `format_date` earlier in the same pass.
        NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid fallback date")
    })
}

fn set_dates(task: &mut Task, start: NaiveDate, end: NaiveDate, changed: &mut bool) {
    let start_s = Some(pls_core::calendar::format_date(start));
    let end_s = Some(pls_core::calendar::format_date(end));
    if task.start != start_s {
        task.start = start_s;
        *changed = true;
    }
    if task.end != end_s {
        task.end = end_s;
        *changed = true;
    }
}

fn apply_start_constraint(
    task: &Task,
    calendar: &Calendar,
    candidate: Option<NaiveDate>,
    duration: i32,
) -> Option<NaiveDate> {
    let constraint_date = task.constraint_date.as_deref().map(calendar_date);
    match task.constraint_type {
        ConstraintType::Asap => match candidate {
            Some(c) => Some(c),
            None if task.start.is_none() => Some(today()),
            None => None,
        },
        ConstraintType::Snet => match constraint_date {
            Some(cd) => Some(candidate.map_or(cd, |c| c.max(cd))),
            None => candidate,
        },
        ConstraintType::Snlt => match constraint_date {
            Some(cd) => {
                let current = candidate.or_else(|| task.start.as_deref().map(calendar_date));
                match current {
                    Some(c) if cd < c => Some(cd),
                    Some(c) => Some(c),
                    None => Some(cd),
                }
            }
            None => candidate,
        },
        ConstraintType::Fnet => match constraint_date {
            Some(cd) => {
                let implied = calendar.add_work_days(cd, -duration_offset(duration));
                Some(candidate.map_or(implied, |c| c.max(implied)))
            }
            None => candidate,
        },
        ConstraintType::Fnlt => {
            // Applied in the backward pass against late_finish, per the
            // teacher's own comment: "FNLT does NOT affect forward pass".
            candidate
        }
        ConstraintType::Mfo => candidate,
    }
}

fn today() -> NaiveDate {
    // The engine is a pure function of its inputs everywhere except this
    // one ASAP-with-no-prior-date bootstrap case (spec §4.3 step 2,
    // "ASAP: accept candidate; if none, today's date"), matching the
    // teacher's `date_utils::today()`.
    chrono::Local::now().date_naive()
}

/// Parent (summary) rollup, forward direction: deepest to shallowest
/// (spec §4.3 step 3).
fn rollup_parent_dates(tasks: &mut [Task], calendar: &Calendar, hierarchy: &Hierarchy) {
    for depth in (0..=hierarchy.max_depth()).rev() {
        let parents: Vec<String> = hierarchy.parents_at_depth(depth).into_iter().map(String::from).collect();
        let mut updates: Vec<(String, NaiveDate, NaiveDate)> = Vec::new();
        for parent_id in &parents {
            let mut min_start: Option<NaiveDate> = None;
            let mut max_end: Option<NaiveDate> = None;
            for child_id in hierarchy.children_of(parent_id) {
                let Some(child) = tasks.iter().find(|t| &t.id == child_id) else { continue };
                if !child.participates_in_scheduling() {
                    continue;
                }
                if let Some(s) = child.start.as_deref().map(calendar_date) {
                    min_start = Some(min_start.map_or(s, |m| m.min(s)));
                }
                if let Some(e) = child.end.as_deref().map(calendar_date) {
                    max_end = Some(max_end.map_or(e, |m| m.max(e)));
                }
            }
            if let (Some(s), Some(e)) = (min_start, max_end) {
                updates.push((parent_id.clone(), s, e));
            }
        }
        for (id, start, end) in updates {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                task.start = Some(pls_core::calendar::format_date(start));
                task.end = Some(pls_core::calendar::format_date(end));
                task.duration = calendar.work_days_between(start, end) as i32;
            }
        }
    }
}

/// Backward pass: Late Start / Late Finish (spec §4.3 step 4).
fn backward_pass(
    tasks: &mut [Task],
    calendar: &Calendar,
    hierarchy: &Hierarchy,
    successors: &HashMap<String, Vec<SuccessorEdge>>,
    max_iterations: usize,
    warnings: &mut Vec<String>,
) {
    let project_end = tasks
        .iter()
        .filter(|t| !hierarchy.is_parent(&t.id) && t.participates_in_scheduling())
        .filter_map(|t| t.end.as_deref().map(calendar_date))
        .max();
    let Some(project_end) = project_end else { return };

    let mut iterations = 0usize;
    let mut changed = true;
    while changed && iterations < max_iterations {
        changed = false;
        iterations += 1;

        let late_snapshot: HashMap<String, Option<NaiveDate>> = tasks
            .iter()
            .map(|t| (t.id.clone(), t.late_start.as_deref().map(calendar_date)))
            .collect();
        let start_snapshot: HashMap<String, Option<NaiveDate>> =
            tasks.iter().map(|t| (t.id.clone(), t.start.as_deref().map(calendar_date))).collect();

        for i in 0..tasks.len() {
            let id = tasks[i].id.clone();
            if hierarchy.is_parent(&id) || !tasks[i].participates_in_scheduling() {
                continue;
            }

            let empty = Vec::new();
            let succs = successors.get(&id).unwrap_or(&empty);
            let mut late_finish: Option<NaiveDate> = if succs.is_empty() {
                Some(project_end)
            } else {
                let mut min_lf: Option<NaiveDate> = None;
                for succ in succs {
                    if hierarchy.is_parent(&succ.id) {
                        continue;
                    }
                    let Some(Some(succ_start)) = start_snapshot.get(&succ.id) else { continue };
                    let succ_ls = late_snapshot.get(&succ.id).copied().flatten().unwrap_or(*succ_start);
                    let duration = tasks[i].duration.max(0);
                    let succ_duration = tasks
                        .iter()
                        .find(|t| t.id == succ.id)
                        .map(|t| t.duration.max(0))
                        .unwrap_or(0);
                    let candidate = match succ.link_type {
                        LinkType::FS => calendar.add_work_days(succ_ls, -1 - succ.lag as i64),
                        LinkType::SS => calendar.add_work_days(succ_ls, duration_offset(duration) - succ.lag as i64),
                        LinkType::FF => calendar.add_work_days(succ_ls, duration_offset(succ_duration) - succ.lag as i64),
                        LinkType::SF => calendar.add_work_days(succ_ls, -succ.lag as i64),
                    };
                    min_lf = Some(min_lf.map_or(candidate, |m| m.min(candidate)));
                }
                min_lf
            };

            if tasks[i].constraint_type == ConstraintType::Fnlt {
                if let Some(cd) = tasks[i].constraint_date.as_deref().map(calendar_date) {
                    late_finish = Some(late_finish.map_or(cd, |lf| lf.min(cd)));
                }
            }

            if let Some(lf) = late_finish {
                let duration = tasks[i].duration.max(0);
                let ls = calendar.add_work_days(lf, -duration_offset(duration));
                let lf_s = Some(pls_core::calendar::format_date(lf));
                let ls_s = Some(pls_core::calendar::format_date(ls));
                if tasks[i].late_finish != lf_s {
                    tasks[i].late_finish = lf_s;
                    changed = true;
                }
                if tasks[i].late_start != ls_s {
                    tasks[i].late_start = ls_s;
                    changed = true;
                }
            }
        }
    }

    if iterations >= max_iterations {
        warnings.push(format!(
            "backward pass did not converge within {max_iterations} iterations; possible circular dependency"
        ));
    }

    rollup_parent_late_dates(tasks, hierarchy);
}

/// Parent rollup, backward direction (spec §4.3 step 5).
fn rollup_parent_late_dates(tasks: &mut [Task], hierarchy: &Hierarchy) {
    for depth in (0..=hierarchy.max_depth()).rev() {
        let parents: Vec<String> = hierarchy.parents_at_depth(depth).into_iter().map(String::from).collect();
        let mut updates: Vec<(String, Option<NaiveDate>, Option<NaiveDate>)> = Vec::new();
        for parent_id in &parents {
            let mut min_ls: Option<NaiveDate> = None;
            let mut max_lf: Option<NaiveDate> = None;
            for child_id in hierarchy.children_of(parent_id) {
                let Some(child) = tasks.iter().find(|t| &t.id == child_id) else { continue };
                if let Some(ls) = child.late_start.as_deref().map(calendar_date) {
                    min_ls = Some(min_ls.map_or(ls, |m| m.min(ls)));
                }
                if let Some(lf) = child.late_finish.as_deref().map(calendar_date) {
                    max_lf = Some(max_lf.map_or(lf, |m| m.max(lf)));
                }
            }
            updates.push((parent_id.clone(), min_ls, max_lf));
        }
        for (id, ls, lf) in updates {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                task.late_start = ls.map(pls_core::calendar::format_date);
                task.late_finish = lf.map(pls_core::calendar::format_date);
            }
        }
    }
}

/// Total and free float (spec §4.3 step 6).
fn calculate_float(
    tasks: &mut [Task],
    calendar: &Calendar,
    hierarchy: &Hierarchy,
    successors: &HashMap<String, Vec<SuccessorEdge>>,
) {
    let snapshot: HashMap<String, (Option<NaiveDate>, Option<NaiveDate>, bool)> = tasks
        .iter()
        .map(|t| {
            (
                t.id.clone(),
                (
                    t.start.as_deref().map(calendar_date),
                    t.end.as_deref().map(calendar_date),
                    hierarchy.is_parent(&t.id),
                ),
            )
        })
        .collect();

    for i in 0..tasks.len() {
        let id = tasks[i].id.clone();
        if hierarchy.is_parent(&id) || !tasks[i].participates_in_scheduling() {
            continue;
        }

        let start = tasks[i].start.as_deref().map(calendar_date);
        let late_start = tasks[i].late_start.as_deref().map(calendar_date);
        let total_float = match (start, late_start) {
            (Some(s), Some(ls)) => calendar.work_days_difference(s, ls),
            _ => 0,
        };
        tasks[i].total_float = Some(total_float);

        let empty = Vec::new();
        let succs = successors.get(&id).unwrap_or(&empty);
        let free_float = if succs.is_empty() {
            total_float
        } else {
            let end = tasks[i].end.as_deref().map(calendar_date);
            let mut min_ff: Option<i64> = None;
            for succ in succs {
                let Some((succ_start, succ_end, is_parent)) = snapshot.get(&succ.id) else { continue };
                if *is_parent || succ_start.is_none() {
                    continue;
                }
                let ff = match succ.link_type {
                    LinkType::FS => {
                        end.zip(*succ_start).map(|(e, ss)| calendar.work_days_difference(e, ss) - 1 - succ.lag as i64)
                    }
                    LinkType::SS => start
                        .zip(*succ_start)
                        .map(|(s, ss)| calendar.work_days_difference(s, ss) - succ.lag as i64),
                    LinkType::FF => {
                        end.zip(*succ_end).map(|(e, se)| calendar.work_days_difference(e, se) - succ.lag as i64)
                    }
                    LinkType::SF => start
                        .zip(*succ_end)
                        .map(|(s, se)| calendar.work_days_difference(s, se) - succ.lag as i64),
                };
                if let Some(v) = ff {
                    min_ff = Some(min_ff.map_or(v, |m| m.min(v)));
                }
            }
            min_ff.map(|v| v.max(0).min(total_float)).unwrap_or(total_float)
        };
        tasks[i].free_float = Some(free_float);
    }

    for depth in (0..=hierarchy.max_depth()).rev() {
        let parents: Vec<String> = hierarchy.parents_at_depth(depth).into_iter().map(String::from).collect();
        let mut updates: Vec<(String, i64)> = Vec::new();
        for parent_id in &parents {
            let min_float = hierarchy
                .children_of(parent_id)
                .iter()
                .filter_map(|cid| tasks.iter().find(|t| &t.id == cid))
                .filter_map(|c| c.total_float)
                .min()
                .unwrap_or(0);
            updates.push((parent_id.clone(), min_float));
        }
        for (id, min_float) in updates {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                task.total_float = Some(min_float);
                task.free_float = Some(0);
            }
        }
    }
}

/// Critical-path marking (spec §4.3 step 7).
fn mark_critical_path(tasks: &mut [Task], hierarchy: &Hierarchy) {
    for task in tasks.iter_mut() {
        if !hierarchy.is_parent(&task.id) && task.participates_in_scheduling() {
            task.is_critical = Some(task.total_float.map_or(false, |tf| tf <= 0));
        }
    }
    for depth in (0..=hierarchy.max_depth()).rev() {
        let parents: Vec<String> = hierarchy.parents_at_depth(depth).into_iter().map(String::from).collect();
        let mut updates: Vec<(String, bool)> = Vec::new();
        for parent_id in &parents {
            let any_critical = hierarchy
                .children_of(parent_id)
                .iter()
                .filter_map(|cid| tasks.iter().find(|t| &t.id == cid))
                .any(|c| c.is_critical.unwrap_or(false));
            updates.push((parent_id.clone(), any_critical));
        }
        for (id, crit) in updates {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                task.is_critical = Some(crit);
            }
        }
    }

    for task in tasks.iter_mut() {
        task.health = Some(match (task.is_critical, task.total_float) {
            (Some(true), _) => TaskHealth::Critical,
            (_, Some(tf)) if tf <= 2 => TaskHealth::AtRisk,
            _ => TaskHealth::OnTrack,
        });
    }
}

/// Run a full CPM calculation pass over `tasks`, returning a new task
/// vector with all calculated fields populated, plus project-level
/// statistics (spec §4.3). Blank/phantom rows are filtered out before any
/// pass runs and passed through unmodified.
pub fn calculate(tasks: &[Task], calendar: &Calendar) -> CalcResult {
    calculate_with_limit(tasks, calendar, DEFAULT_MAX_ITERATIONS)
}

pub fn calculate_with_limit(tasks: &[Task], calendar: &Calendar, max_iterations: usize) -> CalcResult {
    let start_time = std::time::Instant::now();

    if tasks.is_empty() {
        return CalcResult {
            tasks: Vec::new(),
            stats: CalcStats::empty(),
        };
    }

    let mut working: Vec<Task> = tasks.to_vec();
    for t in working.iter_mut() {
        t.duration = t.duration.max(0);
        t.early_start = None;
        t.early_finish = None;
    }

    let hierarchy = Hierarchy::build(&working);
    let successors = build_successor_map(&working);
    let mut warnings = Vec::new();

    forward_pass(&mut working, calendar, &hierarchy, max_iterations, &mut warnings);
    rollup_parent_dates(&mut working, calendar, &hierarchy);
    backward_pass(&mut working, calendar, &hierarchy, &successors, max_iterations, &mut warnings);
    calculate_float(&mut working, calendar, &hierarchy, &successors);
    mark_critical_path(&mut working, &hierarchy);

    for t in working.iter_mut() {
        t.early_start = t.start.clone();
        t.early_finish = t.end.clone();
    }

    let calc_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    let project_end = working
        .iter()
        .filter(|t| !hierarchy.is_parent(&t.id) && t.participates_in_scheduling())
        .filter_map(|t| t.end.as_deref().map(calendar_date))
        .max();
    let project_start = working
        .iter()
        .filter(|t| !hierarchy.is_parent(&t.id) && t.participates_in_scheduling())
        .filter_map(|t| t.start.as_deref().map(calendar_date))
        .min();
    let project_duration = match (project_start, project_end) {
        (Some(s), Some(e)) => calendar.work_days_between(s, e),
        _ => 0,
    };

    let critical_count = working
        .iter()
        .filter(|t| !hierarchy.is_parent(&t.id) && t.is_critical.unwrap_or(false))
        .count();

    CalcResult {
        tasks: working,
        stats: CalcStats {
            calc_time_ms,
            task_count: tasks.len(),
            critical_count,
            project_end,
            project_duration,
            warnings,
            error: None,
        },
    }
}

//! MS Project XML (MSPDI) import/export (spec §6).
//!
//! MSPDI has no native parent-pointer field; hierarchy is implied by
//! `OutlineLevel` plus document order, and task identity is a numeric
//! `UID` rather than our opaque string `id`. Both are reconstructed/
//! projected on the way in and out. Several MSPDI constraint types have
//! no exact counterpart in `ConstraintType` (spec §3) and are degraded on
//! import; see `constraint_code_to_type`.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use pls_core::{
    ordering, Calendar, CalendarException, ConstraintType, Dependency, LinkType, RowType,
    SchedulingMode, Task,
};

use crate::error::{IoError, Result};

/// MSPDI expresses work in hours; the engine works in whole calendar-agnostic
/// work days. MS Project's own default is 8 hours per working day, which is
/// the convention assumed here for both directions of the conversion.
const HOURS_PER_WORK_DAY: f64 = 8.0;
/// `LinkLag` is in tenths of minutes at an 8-hour working day.
const TENTHS_OF_MINUTES_PER_WORK_DAY: i64 = (HOURS_PER_WORK_DAY as i64) * 60 * 10;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename = "Project")]
struct MspdiProject {
    #[serde(rename = "Calendars", default)]
    calendars: CalendarsElement,
    #[serde(rename = "Tasks", default)]
    tasks: TasksElement,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CalendarsElement {
    #[serde(rename = "Calendar", default)]
    calendar: Vec<MspdiCalendar>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct MspdiCalendar {
    #[serde(rename = "UID")]
    uid: u32,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "WeekDays", default)]
    week_days: WeekDaysElement,
    #[serde(rename = "Exceptions", default)]
    exceptions: ExceptionsElement,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct WeekDaysElement {
    #[serde(rename = "WeekDay", default)]
    week_day: Vec<MspdiWeekDay>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct MspdiWeekDay {
    /// 1=Sunday .. 7=Saturday, matching the MSPDI schema's `DayType`.
    #[serde(rename = "DayType")]
    day_type: u8,
    #[serde(rename = "DayWorking")]
    day_working: u8,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ExceptionsElement {
    #[serde(rename = "Exception", default)]
    exception: Vec<MspdiException>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct MspdiException {
    #[serde(rename = "TimePeriod")]
    time_period: MspdiTimePeriod,
    #[serde(rename = "DayWorking", default)]
    day_working: u8,
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct MspdiTimePeriod {
    #[serde(rename = "FromDate")]
    from_date: String,
    #[serde(rename = "ToDate")]
    to_date: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TasksElement {
    #[serde(rename = "Task", default)]
    task: Vec<MspdiTask>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct MspdiTask {
    #[serde(rename = "UID")]
    uid: u32,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "OutlineLevel", default = "default_outline_level")]
    outline_level: u32,
    #[serde(rename = "Duration", default, skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    #[serde(rename = "Start", default, skip_serializing_if = "Option::is_none")]
    start: Option<String>,
    #[serde(rename = "Finish", default, skip_serializing_if = "Option::is_none")]
    finish: Option<String>,
    #[serde(rename = "ConstraintType", default, skip_serializing_if = "Option::is_none")]
    constraint_type: Option<u8>,
    #[serde(rename = "ConstraintDate", default, skip_serializing_if = "Option::is_none")]
    constraint_date: Option<String>,
    #[serde(rename = "Manual", default, skip_serializing_if = "Option::is_none")]
    manual: Option<u8>,
    #[serde(rename = "PercentComplete", default, skip_serializing_if = "Option::is_none")]
    percent_complete: Option<i32>,
    #[serde(rename = "Notes", default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(rename = "PredecessorLink", default)]
    predecessor_link: Vec<MspdiPredecessorLink>,
}

fn default_outline_level() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct MspdiPredecessorLink {
    #[serde(rename = "PredecessorUID")]
    predecessor_uid: u32,
    #[serde(rename = "Type", default)]
    link_type: u8,
    #[serde(rename = "LinkLag", default)]
    link_lag: i64,
}

fn duration_days_to_mspdi(days: i32) -> String {
    let hours = (days.max(0) as f64) * HOURS_PER_WORK_DAY;
    format!("PT{}H0M0S", hours as i64)
}

fn mspdi_duration_to_days(s: &str) -> Result<i32> {
    let rest = s.strip_prefix("PT").ok_or_else(|| IoError::MalformedDuration(s.to_string()))?;
    let h_idx = rest.find('H').ok_or_else(|| IoError::MalformedDuration(s.to_string()))?;
    let hours: f64 = rest[..h_idx].parse().map_err(|_| IoError::MalformedDuration(s.to_string()))?;
    Ok((hours / HOURS_PER_WORK_DAY).round().max(0.0) as i32)
}

fn link_type_to_code(t: LinkType) -> u8 {
    match t {
        LinkType::FF => 0,
        LinkType::FS => 1,
        LinkType::SF => 2,
        LinkType::SS => 3,
    }
}

fn code_to_link_type(code: u8) -> Result<LinkType> {
    match code {
        0 => Ok(LinkType::FF),
        1 => Ok(LinkType::FS),
        2 => Ok(LinkType::SF),
        3 => Ok(LinkType::SS),
        other => Err(IoError::UnknownCode(other as i64, "predecessor link type")),
    }
}

fn lag_days_to_tenths(days: i32) -> i64 {
    days as i64 * TENTHS_OF_MINUTES_PER_WORK_DAY
}

fn tenths_to_lag_days(tenths: i64) -> i32 {
    (tenths as f64 / TENTHS_OF_MINUTES_PER_WORK_DAY as f64).round() as i32
}

/// Degrade an MSPDI constraint code to the nearest `ConstraintType` (spec §3).
/// `ALAP` (as-late-as-possible) has no counterpart and is treated as `ASAP`,
/// letting the forward pass schedule it normally. `MSO` (must-start-on) is
/// approximated as `SNET` pinned to the constraint date: this loses the
/// "must" upper bound half of `MSO`, which this engine has no single field
/// to express alongside `SNET`'s lower bound.
fn constraint_code_to_type(code: u8) -> ConstraintType {
    match code {
        0 | 1 => ConstraintType::Asap,
        2 => ConstraintType::Snet,
        3 => ConstraintType::Mfo,
        4 => ConstraintType::Snet,
        5 => ConstraintType::Snlt,
        6 => ConstraintType::Fnet,
        7 => ConstraintType::Fnlt,
        _ => ConstraintType::Asap,
    }
}

fn constraint_type_to_code(t: ConstraintType) -> u8 {
    match t {
        ConstraintType::Asap => 0,
        ConstraintType::Snet => 4,
        ConstraintType::Snlt => 5,
        ConstraintType::Fnet => 6,
        ConstraintType::Fnlt => 7,
        ConstraintType::Mfo => 3,
    }
}

fn uid_to_id(uid: u32) -> String {
    uid.to_string()
}

fn parse_mspdi_date(s: &str) -> Result<NaiveDate> {
    // MSPDI dates carry a time component (`2024-01-01T08:00:00`); only the
    // date portion is meaningful to this engine's whole-day model.
    let date_part = s.split('T').next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| IoError::MalformedDate(s.to_string()))
}

fn format_mspdi_date(d: NaiveDate) -> String {
    format!("{}T08:00:00", d.format("%Y-%m-%d"))
}

fn weekday_to_day_type(w: Weekday) -> u8 {
    match w {
        Weekday::Sun => 1,
        Weekday::Mon => 2,
        Weekday::Tue => 3,
        Weekday::Wed => 4,
        Weekday::Thu => 5,
        Weekday::Fri => 6,
        Weekday::Sat => 7,
    }
}

fn day_type_to_weekday(day_type: u8) -> Option<Weekday> {
    match day_type {
        1 => Some(Weekday::Sun),
        2 => Some(Weekday::Mon),
        3 => Some(Weekday::Tue),
        4 => Some(Weekday::Wed),
        5 => Some(Weekday::Thu),
        6 => Some(Weekday::Fri),
        7 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Depth (1-based `OutlineLevel`) of each task, walking its `parent_id`
/// chain. Bounded by `visited` so a malformed cyclic hierarchy (which
/// `pls_core::validate_project` should already have rejected upstream)
/// cannot loop forever.
fn outline_level_of(task: &Task, by_id: &BTreeMap<&str, &Task>) -> u32 {
    let mut level = 1u32;
    let mut current = task;
    let mut visited = std::collections::HashSet::new();
    while let Some(parent_id) = &current.parent_id {
        if !visited.insert(parent_id.clone()) {
            break;
        }
        match by_id.get(parent_id.as_str()) {
            Some(parent) => {
                level += 1;
                current = parent;
            }
            None => break,
        }
    }
    level
}

/// Export tasks and calendar to an MSPDI XML document.
pub fn export_mspdi(tasks: &[Task], calendar: &Calendar) -> Result<String> {
    let by_id: BTreeMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let week_day = calendar
        .working_days
        .iter()
        .map(|&w| MspdiWeekDay {
            day_type: weekday_to_day_type(w),
            day_working: 1,
        })
        .collect();

    let exception = calendar
        .exceptions
        .iter()
        .map(|(date, ex)| MspdiException {
            time_period: MspdiTimePeriod {
                from_date: format_mspdi_date(*date),
                to_date: format_mspdi_date(*date),
            },
            day_working: u8::from(ex.working),
            name: ex.description.clone(),
        })
        .collect();

    let mut task_elements = Vec::with_capacity(tasks.len());
    for t in tasks {
        let uid: u32 = t.id.parse().unwrap_or_else(|_| stable_uid(&t.id));
        task_elements.push(MspdiTask {
            uid,
            name: t.name.clone(),
            outline_level: outline_level_of(t, &by_id),
            duration: Some(duration_days_to_mspdi(t.duration)),
            start: convert_date_field(&t.start)?,
            finish: convert_date_field(&t.end)?,
            constraint_type: Some(constraint_type_to_code(t.constraint_type)),
            constraint_date: convert_date_field(&t.constraint_date)?,
            manual: Some(u8::from(t.is_manual())),
            percent_complete: Some(t.progress),
            notes: if t.notes.is_empty() { None } else { Some(t.notes.clone()) },
            predecessor_link: t
                .dependencies
                .iter()
                .map(|d| MspdiPredecessorLink {
                    predecessor_uid: d.id.parse().unwrap_or_else(|_| stable_uid(&d.id)),
                    link_type: link_type_to_code(d.link_type),
                    link_lag: lag_days_to_tenths(d.lag),
                })
                .collect(),
        });
    }

    let project = MspdiProject {
        calendars: CalendarsElement {
            calendar: vec![MspdiCalendar {
                uid: 1,
                name: "Standard".to_string(),
                week_days: WeekDaysElement { week_day },
                exceptions: ExceptionsElement { exception },
            }],
        },
        tasks: TasksElement { task: task_elements },
    };

    Ok(quick_xml::se::to_string(&project)?)
}

/// Fallback numeric UID for ids that are not themselves numeric (e.g. a
/// project round-tripped through the native JSON format, which allows
/// arbitrary string ids). Stable for a given id within one export.
fn stable_uid(id: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for b in id.bytes() {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Parse a `YYYY-MM-DD` core date field and reformat it as an MSPDI
/// datetime string, or `None` if the field is absent/empty.
fn convert_date_field(opt: &Option<String>) -> Result<Option<String>> {
    match opt {
        Some(s) if !s.is_empty() => {
            let date = pls_core::calendar::parse_date(s)?;
            Ok(Some(format_mspdi_date(date)))
        }
        _ => Ok(None),
    }
}

/// Import an MSPDI document, reconstructing hierarchy from `OutlineLevel`
/// plus document order and dependency targets from numeric `UID`s.
pub fn import_mspdi(xml: &str) -> Result<(Vec<Task>, Calendar)> {
    let project: MspdiProject = quick_xml::de::from_str(xml)?;

    let calendar = project
        .calendars
        .calendar
        .first()
        .map(build_calendar)
        .unwrap_or_default();

    // Stack of (outline_level, id) for ancestors still "open" at this point
    // in document order.
    let mut stack: Vec<(u32, String)> = Vec::new();
    let mut last_sort_key_by_parent: BTreeMap<Option<String>, String> = BTreeMap::new();
    let mut tasks = Vec::with_capacity(project.tasks.task.len());

    for raw in &project.tasks.task {
        while let Some((level, _)) = stack.last() {
            if *level >= raw.outline_level {
                stack.pop();
            } else {
                break;
            }
        }
        let parent_id = stack.last().map(|(_, id)| id.clone());
        let id = uid_to_id(raw.uid);

        let last_key = last_sort_key_by_parent.get(&parent_id).map(String::as_str);
        let sort_key = ordering::generate_append_key(last_key)?;
        last_sort_key_by_parent.insert(parent_id.clone(), sort_key.clone());

        let duration = raw.duration.as_deref().map(mspdi_duration_to_days).transpose()?.unwrap_or(0);
        let start = raw.start.as_deref().map(parse_mspdi_date).transpose()?.map(pls_core::calendar::format_date);
        let end = raw.finish.as_deref().map(parse_mspdi_date).transpose()?.map(pls_core::calendar::format_date);
        let constraint_date = raw
            .constraint_date
            .as_deref()
            .map(parse_mspdi_date)
            .transpose()?
            .map(pls_core::calendar::format_date);

        let mut task = Task::new(id.clone(), sort_key, duration);
        task.name = raw.name.clone();
        task.parent_id = parent_id;
        task.row_type = RowType::Task;
        task.start = start;
        task.end = end;
        task.constraint_type = raw.constraint_type.map(constraint_code_to_type).unwrap_or_default();
        task.constraint_date = constraint_date;
        task.scheduling_mode = if raw.manual == Some(1) { SchedulingMode::Manual } else { SchedulingMode::Auto };
        task.progress = raw.percent_complete.unwrap_or(0);
        task.notes = raw.notes.clone().unwrap_or_default();
        task.dependencies = raw
            .predecessor_link
            .iter()
            .map(|l| {
                Ok(Dependency {
                    id: uid_to_id(l.predecessor_uid),
                    link_type: code_to_link_type(l.link_type)?,
                    lag: tenths_to_lag_days(l.link_lag),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        stack.push((raw.outline_level, id));
        tasks.push(task);
    }

    Ok((tasks, calendar))
}

fn build_calendar(raw: &MspdiCalendar) -> Calendar {
    let mut working_days: std::collections::BTreeSet<Weekday> = raw
        .week_days
        .week_day
        .iter()
        .filter(|d| d.day_working == 1)
        .filter_map(|d| day_type_to_weekday(d.day_type))
        .collect();
    if working_days.is_empty() {
        working_days = Calendar::default().working_days;
    }

    let mut exceptions = BTreeMap::new();
    for ex in &raw.exceptions.exception {
        if let Ok(date) = parse_mspdi_date(&ex.time_period.from_date) {
            exceptions.insert(
                date,
                CalendarException {
                    working: ex.day_working == 1,
                    description: ex.name.clone(),
                },
            );
        }
    }

    Calendar { working_days, exceptions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pls_core::LinkType;

    fn sample_tasks() -> Vec<Task> {
        let mut phase = Task::new("1", "V", 0);
        phase.name = "Foundation".into();

        let mut t1 = Task::new("2", "h", 3);
        t1.name = "Excavate".into();
        t1.parent_id = Some("1".into());

        let mut t2 = Task::new("3", "n", 2);
        t2.name = "Pour footings".into();
        t2.parent_id = Some("1".into());
        t2.dependencies.push(Dependency { id: "2".into(), link_type: LinkType::FS, lag: 1 });

        vec![phase, t1, t2]
    }

    #[test]
    fn duration_round_trips_through_hours() {
        let xml = duration_days_to_mspdi(5);
        assert_eq!(xml, "PT40H0M0S");
        assert_eq!(mspdi_duration_to_days(&xml).unwrap(), 5);
    }

    #[test]
    fn lag_round_trips_through_tenths_of_minutes() {
        let tenths = lag_days_to_tenths(2);
        assert_eq!(tenths_to_lag_days(tenths), 2);
    }

    #[test]
    fn link_type_codes_match_mapping_table() {
        assert_eq!(link_type_to_code(LinkType::FF), 0);
        assert_eq!(link_type_to_code(LinkType::FS), 1);
        assert_eq!(link_type_to_code(LinkType::SF), 2);
        assert_eq!(link_type_to_code(LinkType::SS), 3);
        assert_eq!(code_to_link_type(0).unwrap(), LinkType::FF);
        assert_eq!(code_to_link_type(3).unwrap(), LinkType::SS);
        assert!(code_to_link_type(9).is_err());
    }

    #[test]
    fn alap_degrades_to_asap() {
        assert_eq!(constraint_code_to_type(1), ConstraintType::Asap);
    }

    #[test]
    fn mso_degrades_to_snet() {
        assert_eq!(constraint_code_to_type(2), ConstraintType::Snet);
    }

    #[test]
    fn export_then_import_preserves_hierarchy_and_dependencies() {
        let tasks = sample_tasks();
        let xml = export_mspdi(&tasks, &Calendar::default()).unwrap();
        let (imported, _calendar) = import_mspdi(&xml).unwrap();

        assert_eq!(imported.len(), 3);
        let footings = imported.iter().find(|t| t.name == "Pour footings").unwrap();
        assert_eq!(footings.parent_id.as_deref(), Some("1"));
        assert_eq!(footings.dependencies[0].id, "2");
        assert_eq!(footings.dependencies[0].link_type, LinkType::FS);
        assert_eq!(footings.dependencies[0].lag, 1);
    }

    #[test]
    fn outline_level_reconstructs_nested_parent() {
        let tasks = sample_tasks();
        let xml = export_mspdi(&tasks, &Calendar::default()).unwrap();
        let (imported, _calendar) = import_mspdi(&xml).unwrap();
        let excavate = imported.iter().find(|t| t.name == "Excavate").unwrap();
        assert_eq!(excavate.parent_id.as_deref(), Some("1"));
    }

    #[test]
    fn calendar_exceptions_round_trip() {
        let mut calendar = Calendar::default();
        calendar.exceptions.insert(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            CalendarException { working: false, description: Some("New Year's Day".into()) },
        );
        let xml = export_mspdi(&sample_tasks(), &calendar).unwrap();
        let (_tasks, imported_calendar) = import_mspdi(&xml).unwrap();
        let ex = imported_calendar
            .exceptions
            .get(&NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();
        assert!(!ex.working);
    }
}

//! Calendar-aware working-day arithmetic.
//!
//! Grounded in `src-tauri/src/date_utils.rs` (`is_work_day`, `add_work_days`,
//! `calc_work_days`, `calc_work_days_difference`), generalized to operate on
//! `chrono::NaiveDate` instead of re-parsing `YYYY-MM-DD` strings on every
//! call, and to fail loudly on malformed input per spec §4.1 "Failure"
//! rather than silently returning the input back unchanged.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One calendar override: a specific date is forced working or non-working,
/// independent of the weekly pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarException {
    pub working: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The project calendar: one per project (spec §3 "Calendar").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    pub working_days: BTreeSet<Weekday>,
    pub exceptions: BTreeMap<NaiveDate, CalendarException>,
}

impl Default for Calendar {
    /// Mon-Fri working, no exceptions — the calendar used throughout
    /// spec §8's concrete scenarios.
    fn default() -> Self {
        Calendar {
            working_days: [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]
            .into_iter()
            .collect(),
            exceptions: BTreeMap::new(),
        }
    }
}

/// Parse a `YYYY-MM-DD` string; the sole fallible entry point for dates
/// crossing the system boundary (spec §4.1 "Failure").
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| Error::MalformedDate(s.to_string()))
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

impl Calendar {
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        if let Some(exception) = self.exceptions.get(&date) {
            return exception.working;
        }
        self.working_days.contains(&date.weekday())
    }

    /// Advance `n` working days from `date`. `n = 0` returns `date`
    /// unchanged, even if `date` itself is non-working — unlike the
    /// teacher's `add_work_days`, which nudges a non-working day=0 input
    /// forward to the next working day. The spec is explicit ("n = 0
    /// returns date (even if non-working)"), so that nudge is not carried
    /// forward here.
    pub fn add_work_days(&self, date: NaiveDate, n: i64) -> NaiveDate {
        if n == 0 {
            return date;
        }
        let step = if n > 0 { 1 } else { -1 };
        let mut remaining = n.abs();
        let mut current = date;
        while remaining > 0 {
            current += Duration::days(step);
            if self.is_working_day(current) {
                remaining -= 1;
            }
        }
        current
    }

    /// Inclusive count of working days in `[min(a,b), max(a,b)]`, signed by
    /// the relative order of `a` and `b`.
    pub fn work_days_between(&self, a: NaiveDate, b: NaiveDate) -> i64 {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut count = 0i64;
        let mut current = lo;
        while current <= hi {
            if self.is_working_day(current) {
                count += 1;
            }
            current += Duration::days(1);
        }
        if a <= b {
            count
        } else {
            -count
        }
    }

    /// Signed number of working-day steps to walk from `a` to `b` — the
    /// inverse of `add_work_days`.
    pub fn work_days_difference(&self, a: NaiveDate, b: NaiveDate) -> i64 {
        if a == b {
            return 0;
        }
        let forward = a < b;
        let (lo, hi) = if forward { (a, b) } else { (b, a) };
        let mut count = 0i64;
        let mut current = lo;
        while current < hi {
            current += Duration::days(1);
            if self.is_working_day(current) {
                count += 1;
            }
        }
        if forward {
            count
        } else {
            -count
        }
    }
}

/// Wire representation matching the teacher's JS-facing JSON shape:
/// `workingDays` as weekday indices (0=Sun..6=Sat), `exceptions` as a map
/// keyed by `YYYY-MM-DD`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarWire {
    working_days: Vec<u8>,
    #[serde(default)]
    exceptions: BTreeMap<String, CalendarException>,
}

fn weekday_to_index(w: Weekday) -> u8 {
    match w {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

fn index_to_weekday(i: u8) -> Option<Weekday> {
    match i {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

impl Serialize for Calendar {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let wire = CalendarWire {
            working_days: self.working_days.iter().copied().map(weekday_to_index).collect(),
            exceptions: self
                .exceptions
                .iter()
                .map(|(date, ex)| (format_date(*date), ex.clone()))
                .collect(),
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Calendar {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = CalendarWire::deserialize(deserializer)?;
        let working_days = wire
            .working_days
            .into_iter()
            .filter_map(index_to_weekday)
            .collect();
        let mut exceptions = BTreeMap::new();
        for (date_str, ex) in wire.exceptions {
            if let Ok(date) = parse_date(&date_str) {
                exceptions.insert(date, ex);
            }
        }
        Ok(Calendar {
            working_days,
            exceptions,
        })
    }
}

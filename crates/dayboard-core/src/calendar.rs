use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use tracing::debug;

use crate::datetime::{add_days, format_day};
use crate::error::TaskError;
use crate::navigator::DateNavigator;
use crate::task::Task;

pub const DEFAULT_EVENT_COLOR: &str = "#007BFF";
pub const DAY_VIEW_PATH: &str = "/todos";

/// An all-day span in the shape month-grid widgets expect: `end` is
/// exclusive, one day after the scheduled completion date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(serialize_with = "serialize_day")]
    pub start: NaiveDate,
    #[serde(serialize_with = "serialize_day")]
    pub end: NaiveDate,
    pub all_day: bool,
    pub color: String,
}

fn serialize_day<S: serde::Serializer>(day: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_day(*day))
}

impl CalendarEvent {
    pub fn last_day(&self) -> NaiveDate {
        add_days(self.end, -1)
    }

    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }

    pub fn overlaps(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.start <= last && self.last_day() >= first
    }
}

/// Active tasks with both dates set, one event each.
#[tracing::instrument(skip(tasks))]
pub fn events(tasks: &[Task], color: &str) -> Vec<CalendarEvent> {
    let out: Vec<CalendarEvent> = tasks
        .iter()
        .filter(|task| task.is_active())
        .filter_map(|task| {
            let (start, completion) = task.date_range()?;
            Some(CalendarEvent {
                id: task.id.to_string(),
                title: task.title.clone(),
                start,
                end: add_days(completion, 1),
                all_day: true,
                color: color.to_string(),
            })
        })
        .collect();

    debug!(total_tasks = tasks.len(), events = out.len(), "calendar events collected");
    out
}

pub fn events_in_month(events: &[CalendarEvent], year: i32, month: u32) -> Vec<&CalendarEvent> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return vec![];
    };
    let last = last_day_of_month(first);
    events.iter().filter(|e| e.overlaps(first, last)).collect()
}

/// Tasks whose start..=completion span includes `day`.
pub fn tasks_on(tasks: &[Task], day: NaiveDate) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| {
            task.date_range()
                .is_some_and(|(start, completion)| start <= day && day <= completion)
        })
        .collect()
}

/// Leaving the day view for the calendar needs every live task scheduled.
pub fn ensure_schedulable(tasks: &[Task]) -> Result<(), TaskError> {
    let missing: Vec<u64> = tasks
        .iter()
        .filter(|t| !t.delete_flg && t.date_range().is_none())
        .map(|t| t.id)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TaskError::MissingDates(missing))
    }
}

/// Where a click on a calendar day leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayLink {
    pub date: NaiveDate,
}

impl DayLink {
    pub fn param(&self) -> String {
        format_day(self.date)
    }

    pub fn query(&self) -> String {
        format!("date={}", self.param())
    }

    pub fn path(&self) -> String {
        format!("{DAY_VIEW_PATH}?{}", self.query())
    }

    /// Hands the encoded parameter to the day view, exactly as a
    /// navigation would.
    pub fn open(&self, today: NaiveDate) -> DateNavigator {
        DateNavigator::from_param(Some(&self.param()), today)
    }
}

pub fn day_click(date: NaiveDate) -> DayLink {
    DayLink { date }
}

/// Weeks (Monday first) covering the month of `focus`, padded with the
/// neighbouring months' days.
pub fn month_grid(focus: NaiveDate) -> Vec<[NaiveDate; 7]> {
    let first = focus.with_day(1).unwrap_or(focus);
    let last = last_day_of_month(first);
    let mut cursor = start_of_week(first, Weekday::Mon);

    let mut weeks = Vec::new();
    while cursor <= last {
        let mut week = [cursor; 7];
        for (offset, slot) in week.iter_mut().enumerate() {
            *slot = add_days(cursor, offset as i64);
        }
        weeks.push(week);
        cursor = add_days(cursor, 7);
    }
    weeks
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|next| add_days(next, -1))
        .unwrap_or(first)
}

fn start_of_week(day: NaiveDate, week_start: Weekday) -> NaiveDate {
    let day_idx = day.weekday().num_days_from_monday() as i64;
    let start_idx = week_start.num_days_from_monday() as i64;
    add_days(day, -((7 + day_idx - start_idx) % 7))
}

//! Derived, never-persisted shapes handed to route handlers.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{ClassSession, DayOfWeek, SessionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConflict {
    pub student_id: String,
    pub class_id: String,
    pub class_name: String,
    pub day_of_week: DayOfWeek,
    pub existing_start: NaiveTime,
    pub existing_end: NaiveTime,
    pub candidate_start: NaiveTime,
    pub candidate_end: NaiveTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub has_conflicts: bool,
    pub conflicts: Vec<ScheduleConflict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextSession {
    /// A materialized session row.
    Scheduled(ClassSession),
    /// Projected from the weekly schedule; nothing persisted yet.
    Projected {
        class_id: String,
        session_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
}

impl NextSession {
    pub fn session_date(&self) -> NaiveDate {
        match self {
            NextSession::Scheduled(session) => session.session_date,
            NextSession::Projected { session_date, .. } => *session_date,
        }
    }

    pub fn start_time(&self) -> NaiveTime {
        match self {
            NextSession::Scheduled(session) => session.start_time,
            NextSession::Projected { start_time, .. } => *start_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub program_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: SessionStatus,
    pub instructor_id: Option<String>,
    pub notes: Option<String>,
}

/// Seven weekday buckets, each sorted by start.
pub type WeeklySchedule = BTreeMap<DayOfWeek, Vec<CalendarEvent>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainPageScheduleSummary {
    pub days: String,
    pub time_range: String,
    pub age_range: String,
    pub duration: String,
    pub max_students: i64,
    pub min_age: i64,
    /// `None` when the range is open-ended.
    pub max_age: Option<i64>,
}

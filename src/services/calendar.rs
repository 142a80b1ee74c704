use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use sqlx::SqlitePool;

use crate::db::repository::{self, CalendarRow};
use crate::error::{AppError, StoreContext};
use crate::models::{CalendarEvent, DayOfWeek, WeeklySchedule};

pub struct CalendarService {
    db: SqlitePool,
}

impl CalendarService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Sessions in `[start_date, end_date]` as calendar events, ordered by start.
    pub async fn get_calendar_events(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        class_ids: Option<&[String]>,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        if start_date > end_date {
            return Err(AppError::BadRequest(format!(
                "start {} is after end {}",
                start_date, end_date
            )));
        }

        let rows = repository::fetch_calendar_rows(&self.db, start_date, end_date, class_ids)
            .await
            .op("get_calendar_events")?;

        Ok(rows.into_iter().map(to_event).collect())
    }

    pub async fn get_weekly_schedule(
        &self,
        week_start: NaiveDate,
        class_ids: Option<&[String]>,
    ) -> Result<WeeklySchedule, AppError> {
        let week_end = week_start + TimeDelta::days(6);
        let events = self
            .get_calendar_events(week_start, week_end, class_ids)
            .await?;
        Ok(group_by_weekday(events))
    }
}

// Date and time columns are combined as plain local components; no offset
// is ever applied.
fn to_event(row: CalendarRow) -> CalendarEvent {
    CalendarEvent {
        start: NaiveDateTime::new(row.session_date, row.start_time),
        end: NaiveDateTime::new(row.session_date, row.end_time),
        id: row.id,
        class_id: row.class_id,
        title: row.class_name,
        program_name: row.program_name,
        status: row.status,
        instructor_id: row.instructor_id,
        notes: row.notes,
    }
}

/// Buckets events by weekday. All seven days are present, each sorted by start.
pub fn group_by_weekday(events: Vec<CalendarEvent>) -> WeeklySchedule {
    let mut week: WeeklySchedule = DayOfWeek::ALL.iter().map(|d| (*d, Vec::new())).collect();

    for event in events {
        week.entry(DayOfWeek::of(event.start.date()))
            .or_default()
            .push(event);
    }
    for bucket in week.values_mut() {
        bucket.sort_by_key(|e| e.start);
    }

    week
}

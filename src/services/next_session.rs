use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::repository;
use crate::error::{AppError, StoreContext};
use crate::models::{ClassSchedule, NextSession, slot_end};

/// Finds the next upcoming session of a class: a stored one if any,
/// otherwise one projected from the weekly schedule.
pub struct NextSessionResolver {
    db: SqlitePool,
    school_offset: FixedOffset,
}

impl NextSessionResolver {
    pub fn new(db: SqlitePool, school_offset: FixedOffset) -> Self {
        Self { db, school_offset }
    }

    pub async fn get_next_session(
        &self,
        class_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Option<NextSession>, AppError> {
        let local = as_of.with_timezone(&self.school_offset).naive_local();

        if let Some(session) =
            repository::find_next_scheduled_session(&self.db, class_id, local.date())
                .await
                .op("get_next_session")?
        {
            return Ok(Some(NextSession::Scheduled(session)));
        }

        let schedules = repository::fetch_schedules_for_class(&self.db, class_id)
            .await
            .op("get_next_session")?;
        let Some((session_date, start_time)) = next_occurrence(&schedules, local) else {
            debug!("class {} has no recurring schedule", class_id);
            return Ok(None);
        };

        let duration = self.program_duration(class_id).await?;
        let end_time = match duration {
            Some(minutes) => slot_end(start_time, TimeDelta::minutes(minutes)),
            None => start_time,
        };

        Ok(Some(NextSession::Projected {
            class_id: class_id.to_string(),
            session_date,
            start_time,
            end_time,
        }))
    }

    async fn program_duration(&self, class_id: &str) -> Result<Option<i64>, AppError> {
        let Some(class) = repository::find_class_by_id(&self.db, class_id)
            .await
            .op("get_next_session")?
        else {
            return Ok(None);
        };

        Ok(repository::find_program_by_id(&self.db, &class.program_id)
            .await
            .op("get_next_session")?
            .and_then(|p| p.duration_minutes))
    }
}

/// Next date and start time among `schedules` as seen from `as_of`.
///
/// A slot today whose start time has been reached counts as next week.
/// Ties on distance go to the earlier start time, then to row order.
pub fn next_occurrence(
    schedules: &[ClassSchedule],
    as_of: NaiveDateTime,
) -> Option<(NaiveDate, NaiveTime)> {
    let current_day = as_of.weekday().num_days_from_sunday();
    let now = as_of.time();

    schedules
        .iter()
        .map(|s| {
            let mut days = (s.day_of_week.days_from_sunday() + 7 - current_day) % 7;
            if days == 0 && s.start_time <= now {
                days = 7;
            }
            (days, s.start_time)
        })
        .min_by_key(|&(days, start)| (days, start))
        .map(|(days, start)| (as_of.date() + TimeDelta::days(i64::from(days)), start))
}

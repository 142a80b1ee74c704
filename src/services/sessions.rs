use std::collections::HashSet;

use chrono::{NaiveDate, TimeDelta, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::repository;
use crate::error::{AppError, StoreContext};
use crate::models::{
    BulkDeleteResult, ClassSchedule, ClassSession, DayOfWeek, NewSessionRequest, SessionStatus,
    slot_end,
};

/// Upper bound on ids per delete statement during bulk deletion.
pub const BULK_DELETE_BATCH_SIZE: usize = 50;

pub struct SessionService {
    db: SqlitePool,
    default_duration_minutes: i64,
}

impl SessionService {
    pub fn new(db: SqlitePool, default_duration_minutes: i64) -> Self {
        Self {
            db,
            default_duration_minutes,
        }
    }

    /// Materializes sessions for every scheduled weekday in
    /// `[start_date, end_date]`, skipping the ones that fall on
    /// `exclude_dates`. Sessions already stored on those dates are untouched.
    ///
    /// The returned count is taken before exclusion. Running this twice over
    /// the same range creates the sessions twice.
    pub async fn generate_sessions(
        &self,
        class_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        exclude_dates: &[NaiveDate],
    ) -> Result<u64, AppError> {
        if start_date > end_date {
            return Err(AppError::BadRequest(format!(
                "start_date {} is after end_date {}",
                start_date, end_date
            )));
        }

        let class = repository::find_class_by_id(&self.db, class_id)
            .await
            .op("generate_sessions")?
            .ok_or(AppError::NotFound)?;
        let schedules = repository::fetch_schedules_for_class(&self.db, class_id)
            .await
            .op("generate_sessions")?;
        let duration = repository::find_program_by_id(&self.db, &class.program_id)
            .await
            .op("generate_sessions")?
            .and_then(|p| p.duration_minutes)
            .unwrap_or(self.default_duration_minutes);

        let mut sessions = expand_recurrence(
            class_id,
            &schedules,
            start_date,
            end_date,
            TimeDelta::minutes(duration),
        );
        let created = sessions.len() as u64;

        let excluded: HashSet<NaiveDate> = exclude_dates.iter().copied().collect();
        sessions.retain(|s| !excluded.contains(&s.session_date));
        debug!(
            "skipping {} session(s) on excluded dates for class {}",
            created - sessions.len() as u64,
            class_id
        );

        repository::insert_sessions(&self.db, &sessions)
            .await
            .op("generate_sessions")?;

        info!(
            "generated {} session(s) for class {} between {} and {}",
            created, class_id, start_date, end_date
        );
        Ok(created)
    }

    pub async fn create_session(&self, req: NewSessionRequest) -> Result<ClassSession, AppError> {
        if req.end_time <= req.start_time {
            return Err(AppError::BadRequest(
                "end_time must be after start_time".to_string(),
            ));
        }
        repository::find_class_by_id(&self.db, &req.class_id)
            .await
            .op("create_session")?
            .ok_or(AppError::NotFound)?;

        repository::insert_session(&self.db, req)
            .await
            .op("create_session")
    }

    pub async fn list_sessions(&self, class_id: &str) -> Result<Vec<ClassSession>, AppError> {
        repository::fetch_sessions_for_class(&self.db, class_id)
            .await
            .op("list_sessions")
    }

    pub async fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<ClassSession, AppError> {
        let mut session = repository::find_session_by_id(&self.db, session_id)
            .await
            .op("update_session_status")?
            .ok_or(AppError::NotFound)?;

        if !session.status.can_transition_to(status) {
            return Err(AppError::BadRequest(format!(
                "cannot move session from {:?} to {:?}",
                session.status, status
            )));
        }

        repository::update_session_status(&self.db, session_id, status)
            .await
            .op("update_session_status")?;
        session.status = status;
        Ok(session)
    }

    /// Refuses to delete a session that already has attendance.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        repository::find_session_by_id(&self.db, session_id)
            .await
            .op("delete_session")?
            .ok_or(AppError::NotFound)?;

        let attendance = repository::count_attendance_for_session(&self.db, session_id)
            .await
            .op("delete_session")?;
        if attendance > 0 {
            return Err(AppError::Integrity(format!(
                "session {} has {} attendance record(s); remove them first",
                session_id, attendance
            )));
        }

        repository::delete_session(&self.db, session_id)
            .await
            .op("delete_session")?;
        Ok(())
    }

    /// Deletes every session in `[start_date, end_date]` (optionally for one
    /// class) that has no attendance. Sessions with attendance are skipped,
    /// and a failing batch is recorded without stopping the rest.
    pub async fn bulk_delete_class_sessions(
        &self,
        class_id: Option<&str>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BulkDeleteResult, AppError> {
        if start_date > end_date {
            return Err(AppError::BadRequest(format!(
                "start_date {} is after end_date {}",
                start_date, end_date
            )));
        }

        let ids = repository::fetch_session_ids_in_range(&self.db, class_id, start_date, end_date)
            .await
            .op("bulk_delete_class_sessions")?;
        let protected: HashSet<String> = repository::session_ids_with_attendance(&self.db, &ids)
            .await
            .op("bulk_delete_class_sessions")?
            .into_iter()
            .collect();

        let (skipped_ids, deletable): (Vec<String>, Vec<String>) =
            ids.into_iter().partition(|id| protected.contains(id));

        let mut result = BulkDeleteResult {
            skipped_count: skipped_ids.len() as u64,
            skipped_ids,
            ..Default::default()
        };

        for (index, batch) in deletable.chunks(BULK_DELETE_BATCH_SIZE).enumerate() {
            match repository::delete_sessions_without_attendance(&self.db, batch).await {
                Ok(deleted) => result.deleted_count += deleted,
                Err(e) => {
                    warn!("bulk delete batch {} failed: {}", index + 1, e);
                    result
                        .errors
                        .push(format!("batch {} ({} sessions): {}", index + 1, batch.len(), e));
                }
            }
        }

        info!(
            "bulk delete {}..{}: deleted {}, skipped {}, {} failed batch(es)",
            start_date,
            end_date,
            result.deleted_count,
            result.skipped_count,
            result.errors.len()
        );
        Ok(result)
    }
}

/// One session per matching weekday per distinct slot. Repeated slots in the
/// schedule only count once.
pub fn expand_recurrence(
    class_id: &str,
    schedules: &[ClassSchedule],
    start_date: NaiveDate,
    end_date: NaiveDate,
    duration: TimeDelta,
) -> Vec<ClassSession> {
    let mut seen = HashSet::new();
    let slots: Vec<&ClassSchedule> = schedules
        .iter()
        .filter(|s| seen.insert((s.day_of_week, s.start_time)))
        .collect();

    let now = Utc::now().to_rfc3339();
    let mut sessions = Vec::new();

    for date in start_date.iter_days().take_while(|d| *d <= end_date) {
        let day = DayOfWeek::of(date);
        for slot in slots.iter().filter(|s| s.day_of_week == day) {
            sessions.push(ClassSession {
                id: Uuid::new_v4().to_string(),
                class_id: class_id.to_string(),
                session_date: date,
                start_time: slot.start_time,
                end_time: slot_end(slot.start_time, duration),
                status: SessionStatus::Scheduled,
                instructor_id: None,
                notes: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            });
        }
    }

    sessions
}

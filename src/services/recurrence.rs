use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::info;

use crate::db::repository;
use crate::error::{AppError, StoreContext};
use crate::models::{ClassSchedule, ScheduleSlot};

/// CRUD over the weekly slots of a class.
pub struct RecurrenceService {
    db: SqlitePool,
}

impl RecurrenceService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Inserts one slot. Overlaps with other classes are not checked here.
    pub async fn create_schedule(
        &self,
        class_id: &str,
        slot: ScheduleSlot,
    ) -> Result<ClassSchedule, AppError> {
        self.ensure_class(class_id).await?;

        let existing = repository::fetch_schedules_for_class(&self.db, class_id)
            .await
            .op("create_schedule")?;
        if existing
            .iter()
            .any(|s| s.day_of_week == slot.day_of_week && s.start_time == slot.start_time)
        {
            return Err(AppError::BadRequest(format!(
                "class already meets on {} at {}",
                slot.day_of_week.name(),
                slot.start_time
            )));
        }

        let schedule = repository::insert_schedule(&self.db, class_id, slot)
            .await
            .op("create_schedule")?;
        info!(
            "added {} {} slot to class {}",
            schedule.day_of_week.name(),
            schedule.start_time,
            class_id
        );
        Ok(schedule)
    }

    /// All slots of a class, Monday first.
    pub async fn get_schedules(&self, class_id: &str) -> Result<Vec<ClassSchedule>, AppError> {
        repository::fetch_schedules_for_class(&self.db, class_id)
            .await
            .op("get_schedules")
    }

    pub async fn replace_schedules(
        &self,
        class_id: &str,
        slots: &[ScheduleSlot],
    ) -> Result<Vec<ClassSchedule>, AppError> {
        self.ensure_class(class_id).await?;

        let mut seen = HashSet::new();
        for slot in slots {
            if !seen.insert((slot.day_of_week, slot.start_time)) {
                return Err(AppError::BadRequest(format!(
                    "duplicate slot {} {}",
                    slot.day_of_week.name(),
                    slot.start_time
                )));
            }
        }

        let schedules = repository::replace_schedules(&self.db, class_id, slots)
            .await
            .op("replace_schedules")?;
        info!("replaced schedule of class {} with {} slot(s)", class_id, schedules.len());
        Ok(schedules)
    }

    pub async fn delete_schedule(&self, schedule_id: &str) -> Result<(), AppError> {
        let deleted = repository::delete_schedule(&self.db, schedule_id)
            .await
            .op("delete_schedule")?;
        if deleted {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    async fn ensure_class(&self, class_id: &str) -> Result<(), AppError> {
        repository::find_class_by_id(&self.db, class_id)
            .await
            .op("find_class")?
            .map(|_| ())
            .ok_or(AppError::NotFound)
    }
}

use std::collections::BTreeSet;

use chrono::{NaiveTime, TimeDelta, Timelike};
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::repository::{self, NamedSchedule};
use crate::error::{AppError, StoreContext};
use crate::models::{ClassSchedule, ConflictCheck, ScheduleConflict, slot_end};

/// Checks a student's active enrollments against a candidate class.
///
/// Schedule rows carry only a start time, so every slot is treated as
/// lasting `slot_minutes`.
pub struct ConflictDetector {
    db: SqlitePool,
    slot_minutes: i64,
}

impl ConflictDetector {
    pub fn new(db: SqlitePool, slot_minutes: i64) -> Self {
        Self { db, slot_minutes }
    }

    pub async fn check_conflicts(
        &self,
        student_id: &str,
        candidate_class_id: &str,
    ) -> Result<ConflictCheck, AppError> {
        let enrollments = repository::fetch_active_enrollments_for_student(&self.db, student_id)
            .await
            .op("check_conflicts")?;
        if enrollments.is_empty() {
            return Ok(ConflictCheck::default());
        }

        let class_ids: Vec<String> = enrollments
            .into_iter()
            .map(|e| e.class_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let existing = repository::fetch_named_schedules_for_classes(&self.db, &class_ids)
            .await
            .op("check_conflicts")?;
        let candidate = repository::fetch_schedules_for_class(&self.db, candidate_class_id)
            .await
            .op("check_conflicts")?;

        let conflicts = find_conflicts(student_id, &existing, &candidate, self.slot_minutes);
        debug!(
            "student {} vs class {}: {} conflict(s)",
            student_id,
            candidate_class_id,
            conflicts.len()
        );

        Ok(ConflictCheck {
            has_conflicts: !conflicts.is_empty(),
            conflicts,
        })
    }
}

/// One record per overlapping (existing, candidate) pair on the same weekday.
/// Intervals are half-open, so back-to-back slots do not conflict.
pub fn find_conflicts(
    student_id: &str,
    existing: &[NamedSchedule],
    candidate: &[ClassSchedule],
    slot_minutes: i64,
) -> Vec<ScheduleConflict> {
    let mut conflicts = Vec::new();

    for old in existing {
        let old_start = minute_of_day(old.start_time);
        let old_end = old_start + slot_minutes;

        for new in candidate.iter().filter(|n| n.day_of_week == old.day_of_week) {
            let new_start = minute_of_day(new.start_time);
            let new_end = new_start + slot_minutes;

            if new_start < old_end && new_end > old_start {
                conflicts.push(ScheduleConflict {
                    student_id: student_id.to_string(),
                    class_id: old.class_id.clone(),
                    class_name: old.class_name.clone(),
                    day_of_week: old.day_of_week,
                    existing_start: old.start_time,
                    existing_end: slot_end(old.start_time, TimeDelta::minutes(slot_minutes)),
                    candidate_start: new.start_time,
                    candidate_end: slot_end(new.start_time, TimeDelta::minutes(slot_minutes)),
                });
            }
        }
    }

    conflicts
}

fn minute_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight() / 60)
}

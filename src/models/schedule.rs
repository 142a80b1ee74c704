use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DayOfWeek;

/// One weekly recurring slot of a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClassSchedule {
    pub id: String,
    pub class_id: String,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceSchedulesRequest {
    pub schedules: Vec<ScheduleSlot>,
}

/// End of a slot starting at `start`. Slots never run past midnight, so an
/// end that would wrap into the next day is clamped to 23:59:59.
pub fn slot_end(start: NaiveTime, duration: TimeDelta) -> NaiveTime {
    let (end, wrapped) = start.overflowing_add_signed(duration);
    if wrapped != 0 || duration >= TimeDelta::days(1) {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(start)
    } else {
        end
    }
}

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use dojo_backend::db::repository;
use dojo_backend::models::{
    Class, ClassSchedule, DayOfWeek, NewClassRequest, NewProgramRequest, Program, ScheduleSlot,
};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// In-memory database on a single long-lived connection, schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

pub fn slot(day: DayOfWeek, h: u32, m: u32) -> ScheduleSlot {
    ScheduleSlot {
        day_of_week: day,
        start_time: time(h, m),
    }
}

pub async fn create_program(pool: &SqlitePool, name: &str, duration: Option<i64>) -> Program {
    repository::insert_program(
        pool,
        NewProgramRequest {
            name: name.to_string(),
            description: None,
            min_age: Some(5),
            max_age: Some(12),
            duration_minutes: duration,
            max_capacity: Some(18),
        },
    )
    .await
    .expect("Failed to insert program")
}

pub async fn create_class(pool: &SqlitePool, program: &Program, name: &str) -> Class {
    repository::insert_class(
        pool,
        NewClassRequest {
            program_id: program.id.clone(),
            name: name.to_string(),
            description: None,
            max_capacity: None,
            instructor_id: None,
        },
    )
    .await
    .expect("Failed to insert class")
}

pub async fn add_slot(pool: &SqlitePool, class: &Class, day: DayOfWeek, h: u32, m: u32) -> ClassSchedule {
    repository::insert_schedule(pool, &class.id, slot(day, h, m))
        .await
        .expect("Failed to insert schedule")
}

/// Program + class with the given weekly slots.
pub async fn class_with_slots(
    pool: &SqlitePool,
    name: &str,
    slots: &[(DayOfWeek, u32, u32)],
) -> Class {
    let program = create_program(pool, &format!("{} program", name), Some(60)).await;
    let class = create_class(pool, &program, name).await;
    for (day, h, m) in slots {
        add_slot(pool, &class, *day, *h, *m).await;
    }
    class
}

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{
    Attendance, Class, ClassSchedule, ClassSession, DayOfWeek, Enrollment, EnrollmentStatus,
    NewAttendanceRequest, NewClassRequest, NewProgramRequest, NewSessionRequest, Program,
    ScheduleSlot, SessionStatus,
};

const PROGRAM_COLUMNS: &str = "id, name, description, min_age, max_age, duration_minutes, \
     max_capacity, is_active, created_at, updated_at";
const CLASS_COLUMNS: &str = "id, program_id, name, description, max_capacity, instructor_id, \
     is_active, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, class_id, session_date, start_time, end_time, status, \
     instructor_id, notes, created_at, updated_at";
const ENROLLMENT_COLUMNS: &str =
    "id, student_id, class_id, program_id, status, enrolled_at, dropped_at, completed_at";

// SQLite caps bound parameters per statement.
const SESSION_INSERT_CHUNK: usize = 90; // 10 columns per row
const ID_LOOKUP_CHUNK: usize = 500;

/// A dated session joined with its class and program names.
#[derive(Debug, Clone, FromRow)]
pub struct CalendarRow {
    pub id: String,
    pub class_id: String,
    pub class_name: String,
    pub program_name: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SessionStatus,
    pub instructor_id: Option<String>,
    pub notes: Option<String>,
}

/// A weekly slot together with the name of the class it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct NamedSchedule {
    pub class_id: String,
    pub class_name: String,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
}

/// One active class slot with the program fields the public summary needs.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SummaryRow {
    pub program_id: String,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub max_capacity: Option<i64>,
}

// ---------------------------------------------------------------------------
// programs

pub async fn fetch_programs(db: &SqlitePool) -> Result<Vec<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(&format!(
        "SELECT {} FROM programs ORDER BY name",
        PROGRAM_COLUMNS
    ))
    .fetch_all(db)
    .await
}

pub async fn find_program_by_id(db: &SqlitePool, id: &str) -> Result<Option<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(&format!(
        "SELECT {} FROM programs WHERE id = ?",
        PROGRAM_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_program(
    db: &SqlitePool,
    req: NewProgramRequest,
) -> Result<Program, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO programs
            (id, name, description, min_age, max_age, duration_minutes, max_capacity,
            is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
        "#,
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.min_age)
    .bind(req.max_age)
    .bind(req.duration_minutes)
    .bind(req.max_capacity)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Program {
        id,
        name: req.name,
        description: req.description,
        min_age: req.min_age,
        max_age: req.max_age,
        duration_minutes: req.duration_minutes,
        max_capacity: req.max_capacity,
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub async fn count_classes_for_program(db: &SqlitePool, program_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM classes WHERE program_id = ?")
        .bind(program_id)
        .fetch_one(db)
        .await
}

pub async fn delete_program(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM programs WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

// ---------------------------------------------------------------------------
// classes

pub async fn fetch_classes(db: &SqlitePool, include_inactive: bool) -> Result<Vec<Class>, sqlx::Error> {
    let filter = if include_inactive { "" } else { "WHERE is_active = 1" };
    sqlx::query_as::<_, Class>(&format!(
        "SELECT {} FROM classes {} ORDER BY name",
        CLASS_COLUMNS, filter
    ))
    .fetch_all(db)
    .await
}

pub async fn find_class_by_id(db: &SqlitePool, id: &str) -> Result<Option<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!("SELECT {} FROM classes WHERE id = ?", CLASS_COLUMNS))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_class(db: &SqlitePool, req: NewClassRequest) -> Result<Class, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO classes
            (id, program_id, name, description, max_capacity, instructor_id,
            is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
        "#,
    )
    .bind(&id)
    .bind(&req.program_id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.max_capacity)
    .bind(&req.instructor_id)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Class {
        id,
        program_id: req.program_id,
        name: req.name,
        description: req.description,
        max_capacity: req.max_capacity,
        instructor_id: req.instructor_id,
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub async fn deactivate_class(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE classes SET is_active = 0, updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn delete_class(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM classes WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn count_active_enrollments_for_class(
    db: &SqlitePool,
    class_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE class_id = ? AND status = ?")
        .bind(class_id)
        .bind(EnrollmentStatus::Active)
        .fetch_one(db)
        .await
}

pub async fn count_attendance_for_class(db: &SqlitePool, class_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM attendance a
        JOIN class_sessions s ON s.id = a.class_session_id
        WHERE s.class_id = ?
        "#,
    )
    .bind(class_id)
    .fetch_one(db)
    .await
}

// ---------------------------------------------------------------------------
// class_schedules

pub async fn fetch_schedules_for_class(
    db: &SqlitePool,
    class_id: &str,
) -> Result<Vec<ClassSchedule>, sqlx::Error> {
    let mut schedules = sqlx::query_as::<_, ClassSchedule>(
        "SELECT id, class_id, day_of_week, start_time, created_at FROM class_schedules WHERE class_id = ?",
    )
    .bind(class_id)
    .fetch_all(db)
    .await?;

    schedules.sort_by_key(|s| (s.day_of_week, s.start_time));
    Ok(schedules)
}

pub async fn fetch_named_schedules_for_classes(
    db: &SqlitePool,
    class_ids: &[String],
) -> Result<Vec<NamedSchedule>, sqlx::Error> {
    if class_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT s.class_id, c.name AS class_name, s.day_of_week, s.start_time
        FROM class_schedules s
        JOIN classes c ON c.id = s.class_id
        WHERE s.class_id IN (
        "#,
    );
    let mut ids = qb.separated(", ");
    for id in class_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(") ORDER BY s.class_id, s.start_time");

    qb.build_query_as::<NamedSchedule>().fetch_all(db).await
}

pub async fn insert_schedule(
    db: &SqlitePool,
    class_id: &str,
    slot: ScheduleSlot,
) -> Result<ClassSchedule, sqlx::Error> {
    let schedule = ClassSchedule {
        id: Uuid::new_v4().to_string(),
        class_id: class_id.to_string(),
        day_of_week: slot.day_of_week,
        start_time: slot.start_time,
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO class_schedules (id, class_id, day_of_week, start_time, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&schedule.id)
    .bind(&schedule.class_id)
    .bind(schedule.day_of_week)
    .bind(schedule.start_time)
    .bind(&schedule.created_at)
    .execute(db)
    .await?;

    Ok(schedule)
}

/// Delete-all-then-insert-all inside one transaction.
pub async fn replace_schedules(
    db: &SqlitePool,
    class_id: &str,
    slots: &[ScheduleSlot],
) -> Result<Vec<ClassSchedule>, sqlx::Error> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM class_schedules WHERE class_id = ?")
        .bind(class_id)
        .execute(&mut *tx)
        .await?;

    let now = Utc::now().to_rfc3339();
    let schedules: Vec<ClassSchedule> = slots
        .iter()
        .map(|slot| ClassSchedule {
            id: Uuid::new_v4().to_string(),
            class_id: class_id.to_string(),
            day_of_week: slot.day_of_week,
            start_time: slot.start_time,
            created_at: now.clone(),
        })
        .collect();

    if !schedules.is_empty() {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO class_schedules (id, class_id, day_of_week, start_time, created_at) ",
        );
        qb.push_values(&schedules, |mut row, s| {
            row.push_bind(&s.id)
                .push_bind(&s.class_id)
                .push_bind(s.day_of_week)
                .push_bind(s.start_time)
                .push_bind(&s.created_at);
        });
        qb.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    let mut schedules = schedules;
    schedules.sort_by_key(|s| (s.day_of_week, s.start_time));
    Ok(schedules)
}

pub async fn delete_schedule(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM class_schedules WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn fetch_summary_rows(db: &SqlitePool) -> Result<Vec<SummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT
            p.id AS program_id,
            s.day_of_week,
            s.start_time,
            p.min_age,
            p.max_age,
            p.duration_minutes,
            COALESCE(c.max_capacity, p.max_capacity) AS max_capacity
        FROM class_schedules s
        JOIN classes c ON c.id = s.class_id
        JOIN programs p ON p.id = c.program_id
        WHERE c.is_active = 1
        "#,
    )
    .fetch_all(db)
    .await
}

// ---------------------------------------------------------------------------
// class_sessions

pub async fn find_session_by_id(db: &SqlitePool, id: &str) -> Result<Option<ClassSession>, sqlx::Error> {
    sqlx::query_as::<_, ClassSession>(&format!(
        "SELECT {} FROM class_sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn fetch_sessions_for_class(
    db: &SqlitePool,
    class_id: &str,
) -> Result<Vec<ClassSession>, sqlx::Error> {
    sqlx::query_as::<_, ClassSession>(&format!(
        "SELECT {} FROM class_sessions WHERE class_id = ? ORDER BY session_date, start_time",
        SESSION_COLUMNS
    ))
    .bind(class_id)
    .fetch_all(db)
    .await
}

pub async fn insert_session(
    db: &SqlitePool,
    req: NewSessionRequest,
) -> Result<ClassSession, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let session = ClassSession {
        id: Uuid::new_v4().to_string(),
        class_id: req.class_id,
        session_date: req.session_date,
        start_time: req.start_time,
        end_time: req.end_time,
        status: SessionStatus::Scheduled,
        instructor_id: req.instructor_id,
        notes: req.notes,
        created_at: now.clone(),
        updated_at: now,
    };

    insert_sessions(db, std::slice::from_ref(&session)).await?;
    Ok(session)
}

/// Bulk insert in one transaction. Returns the number of rows written.
pub async fn insert_sessions(db: &SqlitePool, sessions: &[ClassSession]) -> Result<u64, sqlx::Error> {
    if sessions.is_empty() {
        return Ok(0);
    }

    let mut tx = db.begin().await?;
    let mut inserted = 0;

    for chunk in sessions.chunks(SESSION_INSERT_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO class_sessions ({}) ",
            SESSION_COLUMNS
        ));
        qb.push_values(chunk, |mut row, s| {
            row.push_bind(&s.id)
                .push_bind(&s.class_id)
                .push_bind(s.session_date)
                .push_bind(s.start_time)
                .push_bind(s.end_time)
                .push_bind(s.status)
                .push_bind(&s.instructor_id)
                .push_bind(&s.notes)
                .push_bind(&s.created_at)
                .push_bind(&s.updated_at);
        });
        inserted += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn update_session_status(
    db: &SqlitePool,
    id: &str,
    status: SessionStatus,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE class_sessions SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn delete_session(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM class_sessions WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Earliest `scheduled` session on or after `today`.
pub async fn find_next_scheduled_session(
    db: &SqlitePool,
    class_id: &str,
    today: NaiveDate,
) -> Result<Option<ClassSession>, sqlx::Error> {
    sqlx::query_as::<_, ClassSession>(&format!(
        r#"
        SELECT {}
        FROM class_sessions
        WHERE class_id = ? AND session_date >= ? AND status = ?
        ORDER BY session_date, start_time
        LIMIT 1
        "#,
        SESSION_COLUMNS
    ))
    .bind(class_id)
    .bind(today)
    .bind(SessionStatus::Scheduled)
    .fetch_optional(db)
    .await
}

pub async fn fetch_calendar_rows(
    db: &SqlitePool,
    start: NaiveDate,
    end: NaiveDate,
    class_ids: Option<&[String]>,
) -> Result<Vec<CalendarRow>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT
            s.id, s.class_id, c.name AS class_name, p.name AS program_name,
            s.session_date, s.start_time, s.end_time, s.status, s.instructor_id, s.notes
        FROM class_sessions s
        JOIN classes c ON c.id = s.class_id
        JOIN programs p ON p.id = c.program_id
        WHERE s.session_date >= "#,
    );
    qb.push_bind(start);
    qb.push(" AND s.session_date <= ");
    qb.push_bind(end);
    push_class_filter(&mut qb, "s.class_id", class_ids);
    qb.push(" ORDER BY s.session_date, s.start_time");

    qb.build_query_as::<CalendarRow>().fetch_all(db).await
}

pub async fn fetch_session_ids_in_range(
    db: &SqlitePool,
    class_id: Option<&str>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<String>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id FROM class_sessions WHERE session_date >= ");
    qb.push_bind(start);
    qb.push(" AND session_date <= ");
    qb.push_bind(end);
    if let Some(class_id) = class_id {
        qb.push(" AND class_id = ");
        qb.push_bind(class_id);
    }
    qb.push(" ORDER BY session_date, start_time");

    qb.build_query_scalar::<String>().fetch_all(db).await
}

/// Subset of `session_ids` referenced by at least one attendance row.
pub async fn session_ids_with_attendance(
    db: &SqlitePool,
    session_ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for chunk in session_ids.chunks(ID_LOOKUP_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT DISTINCT class_session_id FROM attendance WHERE class_session_id IN (",
        );
        let mut list = qb.separated(", ");
        for id in chunk {
            list.push_bind(id);
        }
        list.push_unseparated(")");
        found.extend(qb.build_query_scalar::<String>().fetch_all(db).await?);
    }

    Ok(found)
}

/// Deletes the given sessions, re-checking attendance in the same statement
/// so a row that gained attendance since the caller looked is left alone.
pub async fn delete_sessions_without_attendance(
    db: &SqlitePool,
    session_ids: &[String],
) -> Result<u64, sqlx::Error> {
    if session_ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM class_sessions WHERE id IN (");
    let mut list = qb.separated(", ");
    for id in session_ids {
        list.push_bind(id);
    }
    list.push_unseparated(")");
    qb.push(" AND id NOT IN (SELECT class_session_id FROM attendance)");

    Ok(qb.build().execute(db).await?.rows_affected())
}

fn push_class_filter<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    column: &str,
    class_ids: Option<&'a [String]>,
) {
    if let Some(ids) = class_ids {
        if ids.is_empty() {
            qb.push(" AND 0");
            return;
        }
        qb.push(format!(" AND {} IN (", column));
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(id);
        }
        list.push_unseparated(")");
    }
}

// ---------------------------------------------------------------------------
// enrollments & attendance

pub async fn fetch_active_enrollments_for_student(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {} FROM enrollments WHERE student_id = ? AND status = ? ORDER BY enrolled_at",
        ENROLLMENT_COLUMNS
    ))
    .bind(student_id)
    .bind(EnrollmentStatus::Active)
    .fetch_all(db)
    .await
}

pub async fn find_enrollment_by_id(db: &SqlitePool, id: &str) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {} FROM enrollments WHERE id = ?",
        ENROLLMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_enrollment(
    db: &SqlitePool,
    student_id: &str,
    class: &Class,
    status: EnrollmentStatus,
) -> Result<Enrollment, sqlx::Error> {
    let enrollment = Enrollment {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        class_id: class.id.clone(),
        program_id: class.program_id.clone(),
        status,
        enrolled_at: Utc::now().to_rfc3339(),
        dropped_at: None,
        completed_at: None,
    };

    sqlx::query(&format!(
        "INSERT INTO enrollments ({}) VALUES (?, ?, ?, ?, ?, ?, NULL, NULL)",
        ENROLLMENT_COLUMNS
    ))
    .bind(&enrollment.id)
    .bind(&enrollment.student_id)
    .bind(&enrollment.class_id)
    .bind(&enrollment.program_id)
    .bind(enrollment.status)
    .bind(&enrollment.enrolled_at)
    .execute(db)
    .await?;

    Ok(enrollment)
}

pub async fn update_enrollment_status(
    db: &SqlitePool,
    id: &str,
    status: EnrollmentStatus,
) -> Result<Option<Enrollment>, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE enrollments
        SET status = ?2,
            dropped_at = CASE WHEN ?2 = 'dropped' THEN ?3 ELSE dropped_at END,
            completed_at = CASE WHEN ?2 = 'completed' THEN ?3 ELSE completed_at END
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    if result == 0 {
        return Ok(None);
    }
    find_enrollment_by_id(db, id).await
}

pub async fn insert_attendance(
    db: &SqlitePool,
    req: NewAttendanceRequest,
) -> Result<Attendance, sqlx::Error> {
    let attendance = Attendance {
        id: Uuid::new_v4().to_string(),
        class_session_id: req.class_session_id,
        student_id: req.student_id,
        present: req.present,
        notes: req.notes,
        recorded_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO attendance (id, class_session_id, student_id, present, notes, recorded_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&attendance.id)
    .bind(&attendance.class_session_id)
    .bind(&attendance.student_id)
    .bind(attendance.present)
    .bind(&attendance.notes)
    .bind(&attendance.recorded_at)
    .execute(db)
    .await?;

    Ok(attendance)
}

pub async fn count_attendance_for_session(db: &SqlitePool, session_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE class_session_id = ?")
        .bind(session_id)
        .fetch_one(db)
        .await
}

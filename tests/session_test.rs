mod common;

use common::*;
use dojo_backend::db::repository;
use dojo_backend::error::AppError;
use dojo_backend::models::{DayOfWeek, NewAttendanceRequest, NewSessionRequest, SessionStatus};
use dojo_backend::services::SessionService;
use sqlx::SqlitePool;

async fn attend(pool: &SqlitePool, session_id: &str) {
    repository::insert_attendance(
        pool,
        NewAttendanceRequest {
            class_session_id: session_id.to_string(),
            student_id: "student-1".to_string(),
            present: true,
            notes: None,
        },
    )
    .await
    .expect("Failed to insert attendance");
}

#[tokio::test]
async fn test_generate_sessions_counts_matching_days() {
    let pool = setup_test_db().await;
    let class = class_with_slots(
        &pool,
        "Little Dragons",
        &[(DayOfWeek::Monday, 17, 0), (DayOfWeek::Thursday, 17, 30)],
    )
    .await;
    let service = SessionService::new(pool.clone(), 60);

    // 2026-11-02 (Mon) .. 2026-11-29 (Sun): 4 Mondays + 4 Thursdays
    let created = service
        .generate_sessions(&class.id, date(2026, 11, 2), date(2026, 11, 29), &[])
        .await
        .expect("Failed to generate sessions");
    assert_eq!(created, 8);

    let sessions = service.list_sessions(&class.id).await.unwrap();
    assert_eq!(sessions.len(), 8);
    assert_eq!(sessions[0].session_date, date(2026, 11, 2));
    assert_eq!(sessions[0].start_time, time(17, 0));
    assert_eq!(sessions[0].end_time, time(18, 0));
    assert!(sessions.iter().all(|s| s.status == SessionStatus::Scheduled));
}

#[tokio::test]
async fn test_generate_sessions_uses_program_duration() {
    let pool = setup_test_db().await;
    let program = create_program(&pool, "Adults", Some(90)).await;
    let class = create_class(&pool, &program, "Adults Evening").await;
    add_slot(&pool, &class, DayOfWeek::Tuesday, 19, 0).await;
    let service = SessionService::new(pool.clone(), 60);

    service
        .generate_sessions(&class.id, date(2026, 11, 3), date(2026, 11, 3), &[])
        .await
        .unwrap();

    let sessions = service.list_sessions(&class.id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].end_time, time(20, 30));
}

#[tokio::test]
async fn test_excluded_dates_are_skipped() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[(DayOfWeek::Monday, 18, 0)]).await;
    let service = SessionService::new(pool.clone(), 60);

    // 5 Mondays in November 2026, skip the 16th
    let created = service
        .generate_sessions(
            &class.id,
            date(2026, 11, 1),
            date(2026, 11, 30),
            &[date(2026, 11, 16)],
        )
        .await
        .unwrap();

    // count is taken before exclusion
    assert_eq!(created, 5);
    let sessions = service.list_sessions(&class.id).await.unwrap();
    assert_eq!(sessions.len(), 4);
    assert!(sessions.iter().all(|s| s.session_date != date(2026, 11, 16)));
}

#[tokio::test]
async fn test_exclusion_leaves_existing_attended_session_alone() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[(DayOfWeek::Monday, 18, 0)]).await;
    let service = SessionService::new(pool.clone(), 60);

    let manual = service
        .create_session(NewSessionRequest {
            class_id: class.id.clone(),
            session_date: date(2026, 11, 16),
            start_time: time(18, 0),
            end_time: time(19, 0),
            instructor_id: None,
            notes: Some("makeup".to_string()),
        })
        .await
        .unwrap();
    attend(&pool, &manual.id).await;

    let created = service
        .generate_sessions(
            &class.id,
            date(2026, 11, 1),
            date(2026, 11, 30),
            &[date(2026, 11, 16)],
        )
        .await
        .expect("generation should succeed");
    assert_eq!(created, 5);

    // 4 generated + the manual one on the 16th
    let sessions = service.list_sessions(&class.id).await.unwrap();
    assert_eq!(sessions.len(), 5);
    let on_16th: Vec<_> = sessions
        .iter()
        .filter(|s| s.session_date == date(2026, 11, 16))
        .collect();
    assert_eq!(on_16th.len(), 1);
    assert_eq!(on_16th[0].id, manual.id);
}

#[tokio::test]
async fn test_late_slot_session_ends_before_midnight() {
    let pool = setup_test_db().await;
    let program = create_program(&pool, "Night", None).await;
    let class = create_class(&pool, &program, "Night Owls").await;
    add_slot(&pool, &class, DayOfWeek::Monday, 23, 30).await;
    let service = SessionService::new(pool.clone(), 60);

    service
        .generate_sessions(&class.id, date(2026, 11, 2), date(2026, 11, 2), &[])
        .await
        .unwrap();

    let sessions = service.list_sessions(&class.id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].start_time, time(23, 30));
    assert_eq!(sessions[0].end_time, chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap());
    assert!(sessions[0].end_time > sessions[0].start_time);
}

#[tokio::test]
async fn test_generate_twice_duplicates_sessions() {
    // 冪等ではない: 同じ範囲で二回生成すると二重になる
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[(DayOfWeek::Wednesday, 18, 0)]).await;
    let service = SessionService::new(pool.clone(), 60);

    let first = service
        .generate_sessions(&class.id, date(2026, 11, 1), date(2026, 11, 30), &[])
        .await
        .unwrap();
    let second = service
        .generate_sessions(&class.id, date(2026, 11, 1), date(2026, 11, 30), &[])
        .await
        .unwrap();

    assert_eq!(first, 4);
    assert_eq!(second, 4);
    assert_eq!(service.list_sessions(&class.id).await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_generate_rejects_inverted_range_and_unknown_class() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[(DayOfWeek::Wednesday, 18, 0)]).await;
    let service = SessionService::new(pool.clone(), 60);

    let inverted = service
        .generate_sessions(&class.id, date(2026, 12, 1), date(2026, 11, 1), &[])
        .await;
    assert!(matches!(inverted, Err(AppError::BadRequest(_))));

    let missing = service
        .generate_sessions("nope", date(2026, 11, 1), date(2026, 11, 30), &[])
        .await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_class_without_schedule_generates_nothing() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Private Lessons", &[]).await;
    let service = SessionService::new(pool.clone(), 60);

    let created = service
        .generate_sessions(&class.id, date(2026, 11, 1), date(2026, 11, 30), &[])
        .await
        .unwrap();
    assert_eq!(created, 0);
}

#[tokio::test]
async fn test_session_status_transitions() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[]).await;
    let service = SessionService::new(pool.clone(), 60);

    let session = service
        .create_session(NewSessionRequest {
            class_id: class.id.clone(),
            session_date: date(2026, 11, 5),
            start_time: time(18, 0),
            end_time: time(19, 0),
            instructor_id: Some("sensei-1".to_string()),
            notes: Some("belt test".to_string()),
        })
        .await
        .expect("Failed to create session");
    assert_eq!(session.status, SessionStatus::Scheduled);

    let done = service
        .update_status(&session.id, SessionStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, SessionStatus::Completed);

    let back = service.update_status(&session.id, SessionStatus::Scheduled).await;
    assert!(matches!(back, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_create_session_rejects_end_before_start() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[]).await;
    let service = SessionService::new(pool.clone(), 60);

    let result = service
        .create_session(NewSessionRequest {
            class_id: class.id.clone(),
            session_date: date(2026, 11, 5),
            start_time: time(18, 0),
            end_time: time(17, 0),
            instructor_id: None,
            notes: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_delete_session_with_attendance_is_refused() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[(DayOfWeek::Monday, 18, 0)]).await;
    let service = SessionService::new(pool.clone(), 60);
    service
        .generate_sessions(&class.id, date(2026, 11, 2), date(2026, 11, 9), &[])
        .await
        .unwrap();
    let sessions = service.list_sessions(&class.id).await.unwrap();
    attend(&pool, &sessions[0].id).await;

    let refused = service.delete_session(&sessions[0].id).await;
    assert!(matches!(refused, Err(AppError::Integrity(_))));

    service
        .delete_session(&sessions[1].id)
        .await
        .expect("Failed to delete session without attendance");

    let remaining = service.list_sessions(&class.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, sessions[0].id);
}

#[tokio::test]
async fn test_bulk_delete_skips_sessions_with_attendance() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[]).await;
    let service = SessionService::new(pool.clone(), 60);

    let mut ids = Vec::new();
    for day in 1..=10 {
        let session = service
            .create_session(NewSessionRequest {
                class_id: class.id.clone(),
                session_date: date(2026, 11, day),
                start_time: time(18, 0),
                end_time: time(19, 0),
                instructor_id: None,
                notes: None,
            })
            .await
            .unwrap();
        ids.push(session.id);
    }
    for id in [&ids[1], &ids[4], &ids[8]] {
        attend(&pool, id).await;
    }

    let result = service
        .bulk_delete_class_sessions(Some(&class.id), date(2026, 11, 1), date(2026, 11, 30))
        .await
        .expect("Failed to bulk delete");

    assert_eq!(result.deleted_count, 7);
    assert_eq!(result.skipped_count, 3);
    assert!(result.errors.is_empty());

    let mut remaining: Vec<String> = service
        .list_sessions(&class.id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    remaining.sort();
    let mut expected = vec![ids[1].clone(), ids[4].clone(), ids[8].clone()];
    expected.sort();
    assert_eq!(remaining, expected);
}

#[tokio::test]
async fn test_bulk_delete_across_batch_boundaries() {
    let pool = setup_test_db().await;
    let class = class_with_slots(
        &pool,
        "Daily",
        &[
            (DayOfWeek::Monday, 7, 0),
            (DayOfWeek::Tuesday, 7, 0),
            (DayOfWeek::Wednesday, 7, 0),
            (DayOfWeek::Thursday, 7, 0),
            (DayOfWeek::Friday, 7, 0),
            (DayOfWeek::Saturday, 7, 0),
            (DayOfWeek::Sunday, 7, 0),
            (DayOfWeek::Monday, 19, 0),
            (DayOfWeek::Tuesday, 19, 0),
            (DayOfWeek::Wednesday, 19, 0),
            (DayOfWeek::Thursday, 19, 0),
            (DayOfWeek::Friday, 19, 0),
            (DayOfWeek::Saturday, 19, 0),
            (DayOfWeek::Sunday, 19, 0),
        ],
    )
    .await;
    let service = SessionService::new(pool.clone(), 60);

    // 60 days x 2 slots
    let created = service
        .generate_sessions(&class.id, date(2026, 11, 1), date(2026, 12, 30), &[])
        .await
        .unwrap();
    assert_eq!(created, 120);

    let sessions = service.list_sessions(&class.id).await.unwrap();
    let protected = [&sessions[49].id, &sessions[50].id, &sessions[99].id];
    for id in protected {
        attend(&pool, id).await;
    }

    let result = service
        .bulk_delete_class_sessions(None, date(2026, 11, 1), date(2026, 12, 31))
        .await
        .unwrap();
    assert_eq!(result.deleted_count, 117);
    assert_eq!(result.skipped_count, 3);

    let remaining = service.list_sessions(&class.id).await.unwrap();
    assert_eq!(remaining.len(), 3);
    assert!(remaining.iter().all(|s| protected.contains(&&s.id)));
}

#[tokio::test]
async fn test_bulk_delete_outside_range_is_untouched() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[(DayOfWeek::Monday, 18, 0)]).await;
    let service = SessionService::new(pool.clone(), 60);
    service
        .generate_sessions(&class.id, date(2026, 11, 1), date(2026, 11, 30), &[])
        .await
        .unwrap();

    let result = service
        .bulk_delete_class_sessions(Some(&class.id), date(2026, 11, 10), date(2026, 11, 20))
        .await
        .unwrap();
    // only the 16th falls inside the window
    assert_eq!(result.deleted_count, 1);
    assert_eq!(service.list_sessions(&class.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_bulk_delete_rejects_inverted_range() {
    let pool = setup_test_db().await;
    let service = SessionService::new(pool.clone(), 60);
    let result = service
        .bulk_delete_class_sessions(None, date(2026, 11, 30), date(2026, 11, 1))
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

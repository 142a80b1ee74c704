mod common;

use common::*;
use dojo_backend::db::repository;
use dojo_backend::error::AppError;
use dojo_backend::models::{
    DayOfWeek, EnrollmentStatus, NewAttendanceRequest, NewClassRequest, NewEnrollmentRequest,
    NewProgramRequest,
};
use dojo_backend::services::{CatalogService, EnrollmentService, SessionService};

#[tokio::test]
async fn test_create_program_validates_ages() {
    let pool = setup_test_db().await;
    let catalog = CatalogService::new(pool.clone());

    let result = catalog
        .create_program(NewProgramRequest {
            name: "Backwards".to_string(),
            description: None,
            min_age: Some(12),
            max_age: Some(6),
            duration_minutes: None,
            max_capacity: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_create_class_requires_program() {
    let pool = setup_test_db().await;
    let catalog = CatalogService::new(pool.clone());

    let result = catalog
        .create_class(NewClassRequest {
            program_id: "missing".to_string(),
            name: "Orphan".to_string(),
            description: None,
            max_capacity: None,
            instructor_id: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_program_in_use_cannot_be_deleted() {
    let pool = setup_test_db().await;
    let program = create_program(&pool, "Kids Karate", Some(45)).await;
    let class = create_class(&pool, &program, "Little Dragons").await;
    let catalog = CatalogService::new(pool.clone());

    let refused = catalog.delete_program(&program.id).await;
    assert!(matches!(refused, Err(AppError::Integrity(_))));

    catalog.delete_class(&class.id).await.unwrap();
    catalog.delete_program(&program.id).await.unwrap();
    assert!(catalog.list_programs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_class_with_active_enrollment_cannot_be_deleted() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[(DayOfWeek::Monday, 18, 0)]).await;
    let enrollments = EnrollmentService::new(pool.clone(), 60);
    let enrollment = enrollments
        .enroll(NewEnrollmentRequest {
            student_id: "student-1".to_string(),
            class_id: class.id.clone(),
            status: None,
        })
        .await
        .unwrap();
    let catalog = CatalogService::new(pool.clone());

    let refused = catalog.delete_class(&class.id).await;
    assert!(matches!(refused, Err(AppError::Integrity(_))));

    // 非アクティブにすれば削除できる
    enrollments
        .update_status(&enrollment.id, EnrollmentStatus::Completed)
        .await
        .unwrap();
    catalog.delete_class(&class.id).await.unwrap();
    assert!(repository::find_class_by_id(&pool, &class.id).await.unwrap().is_none());
    assert!(repository::fetch_schedules_for_class(&pool, &class.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_class_with_attendance_cannot_be_deleted() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Teens", &[(DayOfWeek::Monday, 18, 0)]).await;
    let sessions = SessionService::new(pool.clone(), 60);
    sessions
        .generate_sessions(&class.id, date(2026, 11, 2), date(2026, 11, 2), &[])
        .await
        .unwrap();
    let session = &sessions.list_sessions(&class.id).await.unwrap()[0];
    EnrollmentService::new(pool.clone(), 60)
        .record_attendance(NewAttendanceRequest {
            class_session_id: session.id.clone(),
            student_id: "student-1".to_string(),
            present: true,
            notes: None,
        })
        .await
        .unwrap();

    let catalog = CatalogService::new(pool.clone());
    let refused = catalog.delete_class(&class.id).await;
    assert!(matches!(refused, Err(AppError::Integrity(_))));

    catalog.deactivate_class(&class.id).await.unwrap();
    let active = catalog.list_classes(false).await.unwrap();
    assert!(active.is_empty());
    let all = catalog.list_classes(true).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(!all[0].is_active);
}

#[tokio::test]
async fn test_enroll_in_inactive_class_is_rejected() {
    let pool = setup_test_db().await;
    let class = class_with_slots(&pool, "Retired", &[]).await;
    CatalogService::new(pool.clone())
        .deactivate_class(&class.id)
        .await
        .unwrap();

    let result = EnrollmentService::new(pool.clone(), 60)
        .enroll(NewEnrollmentRequest {
            student_id: "student-1".to_string(),
            class_id: class.id.clone(),
            status: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{delete, patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::*;
use crate::services::{
    CalendarService, CatalogService, ConflictDetector, EnrollmentService, NextSessionResolver,
    RecurrenceService, SessionService,
};
use crate::state::AppState;

#[derive(Deserialize)]
struct ClassQueryParams {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Deserialize)]
struct ConflictQueryParams {
    class_id: String,
}

#[derive(Deserialize)]
struct CalendarQueryParams {
    start: NaiveDate,
    end: NaiveDate,
    class_ids: Option<String>,
}

#[derive(Deserialize)]
struct WeekQueryParams {
    start: NaiveDate,
    class_ids: Option<String>,
}

#[derive(Serialize)]
struct GeneratedSessions {
    created: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/programs", get(list_programs).post(create_program))
        .route("/programs/{id}", delete(delete_program))
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/{id}", delete(delete_class))
        .route("/classes/{id}/deactivate", patch(deactivate_class))
        .route(
            "/classes/{id}/schedules",
            get(list_schedules).post(create_schedule).put(replace_schedules),
        )
        .route("/schedules/{id}", delete(delete_schedule))
        .route("/classes/{id}/sessions", get(list_sessions))
        .route("/classes/{id}/sessions/generate", post(generate_sessions))
        .route("/classes/{id}/next-session", get(next_session))
        .route("/sessions", post(create_session))
        .route("/sessions/bulk-delete", post(bulk_delete_sessions))
        .route("/sessions/{id}", delete(delete_session))
        .route("/sessions/{id}/status", patch(update_session_status))
        .route("/enrollments", post(create_enrollment))
        .route("/enrollments/{id}/status", patch(update_enrollment_status))
        .route("/students/{id}/conflicts", get(check_conflicts))
        .route("/attendance", post(record_attendance))
        .route("/calendar", get(calendar_events))
        .route("/calendar/week", get(weekly_schedule))
        .route("/schedule-summary", get(schedule_summary))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_programs(State(state): State<AppState>) -> Result<Json<Vec<Program>>, AppError> {
    let programs = CatalogService::new(state.db.clone()).list_programs().await?;
    Ok(Json(programs))
}

async fn create_program(
    State(state): State<AppState>,
    Json(req): Json<NewProgramRequest>,
) -> Result<(StatusCode, Json<Program>), AppError> {
    let program = CatalogService::new(state.db.clone()).create_program(req).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

async fn delete_program(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(state.db.clone()).delete_program(&id).await?;
    state.summary.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

async fn list_classes(
    State(state): State<AppState>,
    Query(params): Query<ClassQueryParams>,
) -> Result<Json<Vec<Class>>, AppError> {
    let classes = CatalogService::new(state.db.clone())
        .list_classes(params.include_inactive)
        .await?;
    Ok(Json(classes))
}

async fn create_class(
    State(state): State<AppState>,
    Json(req): Json<NewClassRequest>,
) -> Result<(StatusCode, Json<Class>), AppError> {
    let class = CatalogService::new(state.db.clone()).create_class(req).await?;
    state.summary.invalidate();
    Ok((StatusCode::CREATED, Json(class)))
}

async fn deactivate_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(state.db.clone()).deactivate_class(&id).await?;
    state.summary.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(state.db.clone()).delete_class(&id).await?;
    state.summary.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

async fn list_schedules(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClassSchedule>>, AppError> {
    let schedules = RecurrenceService::new(state.db.clone()).get_schedules(&id).await?;
    Ok(Json(schedules))
}

async fn create_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(slot): Json<ScheduleSlot>,
) -> Result<(StatusCode, Json<ClassSchedule>), AppError> {
    let schedule = RecurrenceService::new(state.db.clone())
        .create_schedule(&id, slot)
        .await?;
    state.summary.invalidate();
    Ok((StatusCode::CREATED, Json(schedule)))
}

async fn replace_schedules(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReplaceSchedulesRequest>,
) -> Result<Json<Vec<ClassSchedule>>, AppError> {
    let schedules = RecurrenceService::new(state.db.clone())
        .replace_schedules(&id, &req.schedules)
        .await?;
    state.summary.invalidate();
    Ok(Json(schedules))
}

async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    RecurrenceService::new(state.db.clone()).delete_schedule(&id).await?;
    state.summary.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sessions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClassSession>>, AppError> {
    let sessions = session_service(&state).list_sessions(&id).await?;
    Ok(Json(sessions))
}

async fn generate_sessions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GenerateSessionsRequest>,
) -> Result<Json<GeneratedSessions>, AppError> {
    let created = session_service(&state)
        .generate_sessions(&id, req.start_date, req.end_date, &req.exclude_dates)
        .await?;
    Ok(Json(GeneratedSessions { created }))
}

async fn next_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<NextSession>>, AppError> {
    let resolver = NextSessionResolver::new(state.db.clone(), state.config.school_offset);
    let next = resolver.get_next_session(&id, Utc::now()).await?;
    Ok(Json(next))
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<NewSessionRequest>,
) -> Result<(StatusCode, Json<ClassSession>), AppError> {
    let session = session_service(&state).create_session(req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn update_session_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionStatusRequest>,
) -> Result<Json<ClassSession>, AppError> {
    let session = session_service(&state).update_status(&id, req.status).await?;
    Ok(Json(session))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    session_service(&state).delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_delete_sessions(
    State(state): State<AppState>,
    Json(req): Json<BulkDeleteSessionsRequest>,
) -> Result<Json<BulkDeleteResult>, AppError> {
    let result = session_service(&state)
        .bulk_delete_class_sessions(req.class_id.as_deref(), req.start_date, req.end_date)
        .await?;
    Ok(Json(result))
}

async fn create_enrollment(
    State(state): State<AppState>,
    Json(req): Json<NewEnrollmentRequest>,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    let enrollment = enrollment_service(&state).enroll(req).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

async fn update_enrollment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEnrollmentStatusRequest>,
) -> Result<Json<Enrollment>, AppError> {
    let enrollment = enrollment_service(&state)
        .update_status(&id, req.status)
        .await?;
    Ok(Json(enrollment))
}

async fn check_conflicts(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(params): Query<ConflictQueryParams>,
) -> Result<Json<ConflictCheck>, AppError> {
    let detector =
        ConflictDetector::new(state.db.clone(), state.config.assumed_class_duration_minutes);
    let check = detector
        .check_conflicts(&student_id, &params.class_id)
        .await?;
    Ok(Json(check))
}

async fn record_attendance(
    State(state): State<AppState>,
    Json(req): Json<NewAttendanceRequest>,
) -> Result<(StatusCode, Json<Attendance>), AppError> {
    let attendance = enrollment_service(&state).record_attendance(req).await?;
    Ok((StatusCode::CREATED, Json(attendance)))
}

async fn calendar_events(
    State(state): State<AppState>,
    Query(params): Query<CalendarQueryParams>,
) -> Result<Json<Vec<CalendarEvent>>, AppError> {
    let class_ids = split_ids(params.class_ids.as_deref());
    let events = CalendarService::new(state.db.clone())
        .get_calendar_events(params.start, params.end, class_ids.as_deref())
        .await?;
    Ok(Json(events))
}

async fn weekly_schedule(
    State(state): State<AppState>,
    Query(params): Query<WeekQueryParams>,
) -> Result<Json<WeeklySchedule>, AppError> {
    let class_ids = split_ids(params.class_ids.as_deref());
    let week = CalendarService::new(state.db.clone())
        .get_weekly_schedule(params.start, class_ids.as_deref())
        .await?;
    Ok(Json(week))
}

async fn schedule_summary(
    State(state): State<AppState>,
) -> Json<Option<MainPageScheduleSummary>> {
    let summary = state.summary.get_main_page_schedule_data().await;
    Json(summary.map(|s| (*s).clone()))
}

fn session_service(state: &AppState) -> SessionService {
    SessionService::new(
        state.db.clone(),
        state.config.default_session_duration_minutes,
    )
}

fn enrollment_service(state: &AppState) -> EnrollmentService {
    EnrollmentService::new(state.db.clone(), state.config.assumed_class_duration_minutes)
}

fn split_ids(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(|ids| {
        ids.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
}

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::{AppError, StoreContext};
use crate::models::{
    Attendance, Class, Enrollment, EnrollmentStatus, NewAttendanceRequest, NewClassRequest,
    NewEnrollmentRequest, NewProgramRequest, Program,
};
use crate::services::ConflictDetector;

/// Programs and classes, with the deletion guards that protect them.
pub struct CatalogService {
    db: SqlitePool,
}

impl CatalogService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn list_programs(&self) -> Result<Vec<Program>, AppError> {
        repository::fetch_programs(&self.db).await.op("list_programs")
    }

    pub async fn create_program(&self, req: NewProgramRequest) -> Result<Program, AppError> {
        if req.name.trim().is_empty() {
            return Err(AppError::BadRequest("program name is required".to_string()));
        }
        if let (Some(min), Some(max)) = (req.min_age, req.max_age) {
            if min > max {
                return Err(AppError::BadRequest(format!(
                    "min_age {} is above max_age {}",
                    min, max
                )));
            }
        }
        if req.duration_minutes.is_some_and(|d| d <= 0) {
            return Err(AppError::BadRequest("duration_minutes must be positive".to_string()));
        }

        repository::insert_program(&self.db, req)
            .await
            .op("create_program")
    }

    pub async fn delete_program(&self, program_id: &str) -> Result<(), AppError> {
        let classes = repository::count_classes_for_program(&self.db, program_id)
            .await
            .op("delete_program")?;
        if classes > 0 {
            return Err(AppError::Integrity(format!(
                "program {} is still used by {} class(es)",
                program_id, classes
            )));
        }

        if repository::delete_program(&self.db, program_id)
            .await
            .op("delete_program")?
        {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    pub async fn list_classes(&self, include_inactive: bool) -> Result<Vec<Class>, AppError> {
        repository::fetch_classes(&self.db, include_inactive)
            .await
            .op("list_classes")
    }

    pub async fn create_class(&self, req: NewClassRequest) -> Result<Class, AppError> {
        if req.name.trim().is_empty() {
            return Err(AppError::BadRequest("class name is required".to_string()));
        }
        repository::find_program_by_id(&self.db, &req.program_id)
            .await
            .op("create_class")?
            .ok_or_else(|| AppError::BadRequest(format!("unknown program {}", req.program_id)))?;

        repository::insert_class(&self.db, req)
            .await
            .op("create_class")
    }

    pub async fn deactivate_class(&self, class_id: &str) -> Result<(), AppError> {
        if repository::deactivate_class(&self.db, class_id)
            .await
            .op("deactivate_class")?
        {
            info!("class {} deactivated", class_id);
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    /// Hard delete. Blocked while the class has active enrollments or any of
    /// its sessions has attendance.
    pub async fn delete_class(&self, class_id: &str) -> Result<(), AppError> {
        let active = repository::count_active_enrollments_for_class(&self.db, class_id)
            .await
            .op("delete_class")?;
        if active > 0 {
            return Err(AppError::Integrity(format!(
                "class {} has {} active enrollment(s); deactivate it instead",
                class_id, active
            )));
        }

        let attendance = repository::count_attendance_for_class(&self.db, class_id)
            .await
            .op("delete_class")?;
        if attendance > 0 {
            return Err(AppError::Integrity(format!(
                "class {} has {} attendance record(s); deactivate it instead",
                class_id, attendance
            )));
        }

        if repository::delete_class(&self.db, class_id)
            .await
            .op("delete_class")?
        {
            info!("class {} deleted", class_id);
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}

/// Enrollment bookkeeping. New active enrollments go through the
/// conflict detector first.
pub struct EnrollmentService {
    db: SqlitePool,
    conflicts: ConflictDetector,
}

impl EnrollmentService {
    pub fn new(db: SqlitePool, slot_minutes: i64) -> Self {
        let conflicts = ConflictDetector::new(db.clone(), slot_minutes);
        Self { db, conflicts }
    }

    pub async fn enroll(&self, req: NewEnrollmentRequest) -> Result<Enrollment, AppError> {
        let class = repository::find_class_by_id(&self.db, &req.class_id)
            .await
            .op("enroll")?
            .ok_or(AppError::NotFound)?;
        if !class.is_active {
            return Err(AppError::BadRequest(format!("class {} is not active", class.id)));
        }

        let status = req.status.unwrap_or(EnrollmentStatus::Active);
        if status == EnrollmentStatus::Active {
            let check = self
                .conflicts
                .check_conflicts(&req.student_id, &class.id)
                .await?;
            if check.has_conflicts {
                let names: Vec<String> = check
                    .conflicts
                    .iter()
                    .map(|c| format!("{} ({} {})", c.class_name, c.day_of_week.name(), c.existing_start))
                    .collect();
                warn!(
                    "enrollment of {} in {} blocked by {} conflict(s)",
                    req.student_id,
                    class.id,
                    names.len()
                );
                return Err(AppError::Conflict(format!(
                    "schedule conflicts with {}",
                    names.join(", ")
                )));
            }
        }

        repository::insert_enrollment(&self.db, &req.student_id, &class, status)
            .await
            .op("enroll")
    }

    pub async fn update_status(
        &self,
        enrollment_id: &str,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, AppError> {
        repository::update_enrollment_status(&self.db, enrollment_id, status)
            .await
            .op("update_enrollment_status")?
            .ok_or(AppError::NotFound)
    }

    pub async fn record_attendance(&self, req: NewAttendanceRequest) -> Result<Attendance, AppError> {
        repository::find_session_by_id(&self.db, &req.class_session_id)
            .await
            .op("record_attendance")?
            .ok_or(AppError::NotFound)?;

        repository::insert_attendance(&self.db, req)
            .await
            .op("record_attendance")
    }
}

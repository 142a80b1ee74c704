use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Inactive,
    Completed,
    Dropped,
    Waitlist,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub program_id: String,
    pub status: EnrollmentStatus,
    pub enrolled_at: String,
    pub dropped_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEnrollmentRequest {
    pub student_id: String,
    pub class_id: String,
    pub status: Option<EnrollmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEnrollmentStatusRequest {
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: String,
    pub class_session_id: String,
    pub student_id: String,
    pub present: bool,
    pub notes: Option<String>,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttendanceRequest {
    pub class_session_id: String,
    pub student_id: String,
    #[serde(default = "default_present")]
    pub present: bool,
    pub notes: Option<String>,
}

fn default_present() -> bool {
    true
}

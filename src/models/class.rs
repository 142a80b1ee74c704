use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub id: String,
    pub program_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Overrides the program's capacity when set.
    pub max_capacity: Option<i64>,
    pub instructor_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClassRequest {
    pub program_id: String,
    pub name: String,
    pub description: Option<String>,
    pub max_capacity: Option<i64>,
    pub instructor_id: Option<String>,
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub max_capacity: Option<i64>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProgramRequest {
    pub name: String,
    pub description: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub max_capacity: Option<i64>,
}

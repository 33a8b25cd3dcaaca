//! Student model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A student registered to exactly one teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub teacher_id: String,
    pub active: bool,
    /// Set when soft-deleted; the row is purged once the retention window passes
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for adding a student.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudentRequest {
    #[serde(default)]
    pub name: String,
}

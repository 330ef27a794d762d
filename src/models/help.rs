use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HelpInquiry {
    pub inquiry_id: Uuid,
    pub employee_id: Uuid,
    pub subject: String,
    pub message: String,
    pub priority: String,
    pub status: String,
    pub response: Option<String>,
    pub responded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

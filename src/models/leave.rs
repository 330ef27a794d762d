use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Leave {
    pub leave_id: Uuid,
    pub employee_id: Uuid,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub day_count: i32,
    pub reason: String,
    pub status: String,
    pub approver_id: Option<Uuid>,
    pub approver_comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Leave joined with the requesting employee's name, for staff listings.
#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LeaveWithEmployee {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub leave: Leave,
    pub employee_name: String,
}

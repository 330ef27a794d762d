use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

use crate::services::task_report::TaskItem;

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub report_id: Uuid,
    pub employee_id: Uuid,
    pub report_date: NaiveDate,
    pub tasks: Json<Vec<TaskItem>>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TaskReportWithEmployee {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub report: TaskReport,
    pub employee_name: String,
}

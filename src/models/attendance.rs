use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub attendance_id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub work_hours: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceWithEmployee {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attendance: Attendance,
    pub employee_name: String,
}

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Regularization {
    pub regularization_id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub check_in: NaiveTime,
    pub check_out: NaiveTime,
    pub reason: String,
    pub status: String,
    /// The day's record as it stood before approval; `previous_status` is
    /// `None` when the approval created it.
    #[serde(skip_serializing)]
    pub previous_check_in: Option<NaiveTime>,
    #[serde(skip_serializing)]
    pub previous_check_out: Option<NaiveTime>,
    #[serde(skip_serializing)]
    pub previous_status: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WfhRequest {
    pub wfh_id: Uuid,
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: String,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

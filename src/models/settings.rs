use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::services::attendance::AttendancePolicy;

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompanySettings {
    pub company_name: String,
    pub company_logo_uri: Option<String>,
    pub office_start: NaiveTime,
    pub late_grace_minutes: i32,
    pub half_day_hours: f64,
    pub absent_below_hours: f64,
    pub default_tax_regime: String,
    pub updated_at: DateTime<Utc>,
}

impl CompanySettings {
    pub fn attendance_policy(&self) -> AttendancePolicy {
        AttendancePolicy {
            office_start: self.office_start,
            late_grace_minutes: self.late_grace_minutes,
            half_day_hours: self.half_day_hours,
            absent_below_hours: self.absent_below_hours,
        }
    }
}

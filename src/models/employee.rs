use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: Uuid,
    pub employee_code: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub department_id: Option<Uuid>,
    pub position: String,
    pub joining_date: NaiveDate,
    pub bank_account_number: Option<String>,
    pub bank_ifsc: Option<String>,
    pub bank_name: Option<String>,
    pub pan_number: Option<String>,
    pub profile_image_uri: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::employee::Employee;

#[derive(sqlx::FromRow, Debug)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password: String,
    pub role: String,
    pub employee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub employee: Option<Employee>,
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

use crate::services::payroll::{Deduction, Earnings};

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SalaryStructure {
    pub employee_id: Uuid,
    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub other_allowances: f64,
    pub tax_regime: String,
    pub declared_80c: f64,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalaryStructure {
    pub fn earnings(&self) -> Earnings {
        Earnings {
            basic: self.basic,
            hra: self.hra,
            special_allowance: self.special_allowance,
            other_allowances: self.other_allowances,
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SalarySlip {
    pub slip_id: Uuid,
    pub employee_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub other_allowances: f64,
    pub gross: f64,
    pub tax: f64,
    pub tax_regime: String,
    pub deductions: Json<Vec<Deduction>>,
    pub total_deductions: f64,
    pub net_pay: f64,
    pub generated_by: Option<Uuid>,
    pub generated_at: DateTime<Utc>,
}

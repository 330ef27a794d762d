use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::employee::fetch_employee;
use crate::handlers::notification::{notify_employee, NotificationKind};
use crate::handlers::page;
use crate::handlers::settings::load_settings;
use crate::models::salary::{SalarySlip, SalaryStructure};
use crate::services::payroll::{self, Deduction, Earnings};
use crate::services::tax::{self, TaxRegime};
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StructureUpdate {
    #[validate(range(min = 0.0))]
    basic: f64,
    #[validate(range(min = 0.0))]
    hra: f64,
    #[validate(range(min = 0.0))]
    special_allowance: f64,
    #[validate(range(min = 0.0))]
    other_allowances: f64,
    tax_regime: Option<TaxRegime>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    declared_80c: f64,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SlipRequest {
    employee_id: Uuid,
    #[validate(range(min = 1, max = 12))]
    month: i32,
    #[validate(range(min = 2000, max = 2100))]
    year: i32,
    #[validate]
    #[serde(default)]
    deductions: Vec<Deduction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlipQueryParams {
    employee_id: Option<Uuid>,
    year: Option<i32>,
    month: Option<i32>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaxPreviewRequest {
    #[validate(range(min = 0.0))]
    gross_annual: f64,
    regime: Option<TaxRegime>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    declared_80c: f64,
}

fn stored_regime(regime: &str) -> Result<TaxRegime, AppError> {
    TaxRegime::parse(regime)
        .ok_or_else(|| AppError::InternalServerError(format!("Unknown tax regime {}", regime)))
}

async fn fetch_structure(pool: &PgPool, employee_id: Uuid) -> Result<SalaryStructure, AppError> {
    sqlx::query_as::<_, SalaryStructure>("SELECT * FROM salary_structures WHERE employee_id = $1")
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Salary structure not found".to_string()))
}

pub async fn get_structure(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    employee_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let employee_id = employee_id.into_inner();
    auth.require_access_to(employee_id)?;
    Ok(HttpResponse::Ok().json(fetch_structure(&pool, employee_id).await?))
}

pub async fn put_structure(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    employee_id: web::Path<Uuid>,
    update: web::Json<StructureUpdate>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    validate_payload(&update.0)?;
    let employee = fetch_employee(&pool, employee_id.into_inner()).await?;

    let regime = match update.tax_regime {
        Some(regime) => regime,
        None => stored_regime(&load_settings(&**pool).await?.default_tax_regime)?,
    };

    let now = Utc::now();
    let structure = sqlx::query_as::<_, SalaryStructure>(
        "INSERT INTO salary_structures (employee_id, basic, hra, special_allowance, other_allowances, \
         tax_regime, declared_80c, updated_by, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
         ON CONFLICT (employee_id) DO UPDATE SET basic = EXCLUDED.basic, hra = EXCLUDED.hra, \
         special_allowance = EXCLUDED.special_allowance, other_allowances = EXCLUDED.other_allowances, \
         tax_regime = EXCLUDED.tax_regime, declared_80c = EXCLUDED.declared_80c, \
         updated_by = EXCLUDED.updated_by, updated_at = EXCLUDED.updated_at \
         RETURNING *",
    )
    .bind(employee.employee_id)
    .bind(update.basic)
    .bind(update.hra)
    .bind(update.special_allowance)
    .bind(update.other_allowances)
    .bind(regime.as_str())
    .bind(update.declared_80c)
    .bind(auth.user_id)
    .bind(now)
    .fetch_one(&**pool)
    .await?;

    info!("Salary structure of {} updated by {}", employee.employee_id, auth.user_id);
    Ok(HttpResponse::Ok().json(structure))
}

/// Generating the same month twice replaces the earlier slip under its
/// original id.
pub async fn generate_slip(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    request: web::Json<SlipRequest>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    validate_payload(&request.0)?;
    let employee = fetch_employee(&pool, request.employee_id).await?;
    if !employee.is_active {
        return Err(AppError::BadRequest("Employee is deactivated".to_string()));
    }
    let structure = fetch_structure(&pool, employee.employee_id).await?;
    let regime = stored_regime(&structure.tax_regime)?;
    let earnings: Earnings = structure.earnings();
    let figures = payroll::compute_slip(&earnings, regime, structure.declared_80c, &request.deductions)?;

    let mut tx = pool.begin().await?;
    let slip = sqlx::query_as::<_, SalarySlip>(
        "INSERT INTO salary_slips (slip_id, employee_id, month, year, basic, hra, special_allowance, \
         other_allowances, gross, tax, tax_regime, deductions, total_deductions, net_pay, generated_by, \
         generated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         ON CONFLICT (employee_id, month, year) DO UPDATE SET basic = EXCLUDED.basic, hra = EXCLUDED.hra, \
         special_allowance = EXCLUDED.special_allowance, other_allowances = EXCLUDED.other_allowances, \
         gross = EXCLUDED.gross, tax = EXCLUDED.tax, tax_regime = EXCLUDED.tax_regime, \
         deductions = EXCLUDED.deductions, total_deductions = EXCLUDED.total_deductions, \
         net_pay = EXCLUDED.net_pay, generated_by = EXCLUDED.generated_by, \
         generated_at = EXCLUDED.generated_at \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(employee.employee_id)
    .bind(request.month)
    .bind(request.year)
    .bind(earnings.basic)
    .bind(earnings.hra)
    .bind(earnings.special_allowance)
    .bind(earnings.other_allowances)
    .bind(figures.gross)
    .bind(figures.tax)
    .bind(regime.as_str())
    .bind(Json(&request.deductions))
    .bind(figures.total_deductions)
    .bind(figures.net_pay)
    .bind(auth.user_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    let message = format!(
        "Your salary slip for {:02}/{} is available. Net pay: {:.2}",
        slip.month, slip.year, slip.net_pay
    );
    notify_employee(&mut *tx, slip.employee_id, NotificationKind::SalarySlip, "Salary slip generated", &message)
        .await?;
    tx.commit().await?;

    info!(
        "Salary slip {:02}/{} generated for {} by {}",
        slip.month, slip.year, slip.employee_id, auth.user_id
    );
    Ok(HttpResponse::Created().json(slip))
}

pub async fn get_slips(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<SlipQueryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_to(query.employee_id)?;

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> =
        sqlx::QueryBuilder::new("SELECT * FROM salary_slips WHERE TRUE");
    if let Some(employee_id) = employee_id {
        query_builder.push(" AND employee_id = ");
        query_builder.push_bind(employee_id);
    }
    if let Some(year) = query.year {
        query_builder.push(" AND year = ");
        query_builder.push_bind(year);
    }
    if let Some(month) = query.month {
        query_builder.push(" AND month = ");
        query_builder.push_bind(month);
    }

    let (limit, offset) = page(query.limit, query.offset);
    query_builder.push(" ORDER BY year DESC, month DESC LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let slips = query_builder
        .build_query_as::<SalarySlip>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(slips))
}

pub async fn get_slip(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    slip_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let slip = sqlx::query_as::<_, SalarySlip>("SELECT * FROM salary_slips WHERE slip_id = $1")
        .bind(slip_id.into_inner())
        .fetch_optional(&**pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Salary slip not found".to_string()))?;
    auth.require_access_to(slip.employee_id)?;
    Ok(HttpResponse::Ok().json(slip))
}

pub async fn tax_preview(
    _auth: AuthUser,
    pool: web::Data<PgPool>,
    request: web::Json<TaxPreviewRequest>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&request.0)?;
    let regime = match request.regime {
        Some(regime) => regime,
        None => stored_regime(&load_settings(&**pool).await?.default_tax_regime)?,
    };
    let breakdown = tax::annual_tax(request.gross_annual, regime, request.declared_80c)?;
    Ok(HttpResponse::Ok().json(breakdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slip_request_validates_month_and_deductions() {
        let request: SlipRequest = serde_json::from_value(json!({
            "employeeId": Uuid::new_v4(),
            "month": 13,
            "year": 2025
        }))
        .unwrap();
        assert!(request.deductions.is_empty());
        assert!(request.validate().is_err());

        let request: SlipRequest = serde_json::from_value(json!({
            "employeeId": Uuid::new_v4(),
            "month": 4,
            "year": 2025,
            "deductions": [{ "name": "", "amount": 200.0 }]
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: SlipRequest = serde_json::from_value(json!({
            "employeeId": Uuid::new_v4(),
            "month": 4,
            "year": 2025,
            "deductions": [{ "name": "Professional tax", "amount": 200.0 }]
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn structure_rejects_negative_components() {
        let update: StructureUpdate = serde_json::from_value(json!({
            "basic": 50000.0,
            "hra": -1.0,
            "specialAllowance": 0.0,
            "otherAllowances": 0.0,
            "declared80c": 150000.0
        }))
        .unwrap();
        assert!(update.validate().is_err());
        assert_eq!(update.tax_regime, None);
    }

    #[actix_web::test]
    async fn tax_preview_with_explicit_regime_needs_no_database() {
        use crate::config::test_config;
        use crate::utils::{auth::Role, jwt};
        use actix_web::{http::StatusCode, test, App};
        use sqlx::postgres::PgPoolOptions;

        let config = test_config();
        let token = jwt::generate_token(&config.jwt_secret, Uuid::new_v4(), Role::Employee, Some(Uuid::new_v4()))
            .unwrap();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(pool))
                .route("/salary/tax-preview", web::post().to(tax_preview)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/salary/tax-preview")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({ "grossAnnual": 2_575_000.0, "regime": "new" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["annualTax"], json!(343_200.0));
        assert_eq!(body["monthlyTds"], json!(28_600.0));
    }

    #[test]
    fn stored_regime_rejects_unknown_values() {
        assert_eq!(stored_regime("old").unwrap(), TaxRegime::Old);
        assert!(stored_regime("flat").is_err());
    }
}

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::page;
use crate::models::employee::Employee;
use crate::utils::auth::{AuthUser, Role};
use crate::utils::validation::{
    validate_gender, validate_ifsc, validate_pan, validate_payload, validate_phone,
};
use crate::utils::password;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[validate(length(min = 8, max = 64))]
    password: String,
    #[serde(default = "default_role")]
    role: Role,
}

fn default_role() -> Role {
    Role::Employee
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    #[validate(length(min = 2, max = 32))]
    employee_code: String,
    #[validate(length(min = 2, max = 64))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(custom = "validate_phone")]
    phone: Option<String>,
    #[validate(custom = "validate_gender")]
    gender: String,
    date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 256))]
    address: Option<String>,
    department_id: Option<Uuid>,
    #[validate(length(min = 2, max = 64))]
    position: String,
    joining_date: NaiveDate,
    #[validate(length(min = 6, max = 20))]
    bank_account_number: Option<String>,
    #[validate(custom = "validate_ifsc")]
    bank_ifsc: Option<String>,
    #[validate(length(min = 2, max = 64))]
    bank_name: Option<String>,
    #[validate(custom = "validate_pan")]
    pan_number: Option<String>,
    #[validate]
    account: Option<NewAccount>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQueryParams {
    employee_code: Option<String>,
    name: Option<String>,
    department_id: Option<Uuid>,
    is_active: Option<bool>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmployeeUpdate {
    #[validate(length(min = 2, max = 64))]
    name: Option<String>,
    #[validate(email)]
    email: Option<String>,
    #[validate(custom = "validate_phone")]
    phone: Option<String>,
    #[validate(custom = "validate_gender")]
    gender: Option<String>,
    date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 256))]
    address: Option<String>,
    department_id: Option<Uuid>,
    #[validate(length(min = 2, max = 64))]
    position: Option<String>,
    joining_date: Option<NaiveDate>,
    #[validate(length(min = 6, max = 20))]
    bank_account_number: Option<String>,
    #[validate(custom = "validate_ifsc")]
    bank_ifsc: Option<String>,
    #[validate(length(min = 2, max = 64))]
    bank_name: Option<String>,
    #[validate(custom = "validate_pan")]
    pan_number: Option<String>,
    is_active: Option<bool>,
}

pub async fn fetch_employee(pool: &PgPool, employee_id: Uuid) -> Result<Employee, AppError> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE employee_id = $1")
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))
}

pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    new_employee: web::Json<NewEmployee>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    validate_payload(&new_employee.0)?;
    let new_employee = new_employee.into_inner();

    if let Some(account) = &new_employee.account {
        if account.role != Role::Employee {
            auth.require_admin()?;
        }
    }

    if sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM employees WHERE employee_code = $1 OR LOWER(email) = LOWER($2))",
    )
    .bind(&new_employee.employee_code)
    .bind(&new_employee.email)
    .fetch_one(&**pool)
    .await?
    {
        return Err(AppError::Conflict("Employee code or email already exists".to_string()));
    }

    let employee_id = Uuid::new_v4();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let employee = sqlx::query_as::<_, Employee>(
        "INSERT INTO employees (employee_id, employee_code, name, email, phone, gender, date_of_birth, \
         address, department_id, position, joining_date, bank_account_number, bank_ifsc, bank_name, \
         pan_number, profile_image_uri, is_active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NULL, TRUE, $16, $16) \
         RETURNING *",
    )
    .bind(employee_id)
    .bind(&new_employee.employee_code)
    .bind(&new_employee.name)
    .bind(&new_employee.email)
    .bind(&new_employee.phone)
    .bind(&new_employee.gender)
    .bind(new_employee.date_of_birth)
    .bind(&new_employee.address)
    .bind(new_employee.department_id)
    .bind(&new_employee.position)
    .bind(new_employee.joining_date)
    .bind(&new_employee.bank_account_number)
    .bind(&new_employee.bank_ifsc)
    .bind(&new_employee.bank_name)
    .bind(&new_employee.pan_number)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(account) = &new_employee.account {
        let password_hash = password::hash_password(&account.password)?;
        sqlx::query(
            "INSERT INTO users (user_id, email, password, role, employee_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(&new_employee.email)
        .bind(&password_hash)
        .bind(account.role.as_str())
        .bind(employee_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!("Employee {} onboarded by {}", employee.employee_code, auth.user_id);

    Ok(HttpResponse::Created().json(employee))
}

pub async fn get_employees(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<EmployeeQueryParams>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> =
        sqlx::QueryBuilder::new("SELECT * FROM employees WHERE TRUE");

    if let Some(employee_code) = &query.employee_code {
        query_builder.push(" AND employee_code LIKE ");
        query_builder.push_bind(format!("{}%", employee_code));
    }
    if let Some(name) = &query.name {
        query_builder.push(" AND name ILIKE ");
        query_builder.push_bind(format!("%{}%", name));
    }
    if let Some(department_id) = query.department_id {
        query_builder.push(" AND department_id = ");
        query_builder.push_bind(department_id);
    }
    query_builder.push(" AND is_active = ");
    query_builder.push_bind(query.is_active.unwrap_or(true));

    let (limit, offset) = page(query.limit, query.offset);
    query_builder.push(" ORDER BY created_at DESC LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let employees = query_builder
        .build_query_as::<Employee>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(employees))
}

pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    employee_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let employee_id = employee_id.into_inner();
    auth.require_access_to(employee_id)?;
    Ok(HttpResponse::Ok().json(fetch_employee(&pool, employee_id).await?))
}

fn update_query(updates: &EmployeeUpdate, employee_id: Uuid) -> sqlx::QueryBuilder<'_, sqlx::Postgres> {
    let mut query: sqlx::QueryBuilder<'_, sqlx::Postgres> = sqlx::QueryBuilder::new("UPDATE employees SET ");
    let mut separated = query.separated(", ");
    macro_rules! set {
        ($column:literal, $value:expr) => {
            if let Some(value) = $value {
                separated.push(concat!($column, " = "));
                separated.push_bind_unseparated(value);
            }
        };
    }
    set!("name", &updates.name);
    set!("email", &updates.email);
    set!("phone", &updates.phone);
    set!("gender", &updates.gender);
    set!("date_of_birth", updates.date_of_birth);
    set!("address", &updates.address);
    set!("department_id", updates.department_id);
    set!("position", &updates.position);
    set!("joining_date", updates.joining_date);
    set!("bank_account_number", &updates.bank_account_number);
    set!("bank_ifsc", &updates.bank_ifsc);
    set!("bank_name", &updates.bank_name);
    set!("pan_number", &updates.pan_number);
    set!("is_active", updates.is_active);
    separated.push("updated_at = ");
    separated.push_bind_unseparated(Utc::now());
    query.push(" WHERE employee_id = ");
    query.push_bind(employee_id);
    query.push(" RETURNING *");
    query
}

pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    employee_id: web::Path<Uuid>,
    updates: web::Json<EmployeeUpdate>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    validate_payload(&updates.0)?;
    let employee_id = employee_id.into_inner();
    fetch_employee(&pool, employee_id).await?;

    let mut tx = pool.begin().await?;
    let updated_employee = update_query(&updates, employee_id)
        .build_query_as::<Employee>()
        .fetch_one(&mut *tx)
        .await?;

    // keep the login email in step with the employee record
    if let Some(email) = &updates.email {
        sqlx::query("UPDATE users SET email = $1, updated_at = $2 WHERE employee_id = $3")
            .bind(email)
            .bind(Utc::now())
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(updated_employee))
}

/// Soft delete: the record and its history stay. New logins are refused, and
/// tokens already issued can no longer write.
pub async fn deactivate_employee(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    employee_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    let employee_id = employee_id.into_inner();

    let result = sqlx::query(
        "UPDATE employees SET is_active = FALSE, updated_at = $1 WHERE employee_id = $2 AND is_active",
    )
    .bind(Utc::now())
    .bind(employee_id)
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Active employee not found".to_string()));
    }
    info!("Employee {} deactivated by {}", employee_id, auth.user_id);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee deactivated successfully",
    })))
}

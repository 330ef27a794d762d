use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::page;
use crate::models::department::{Department, DepartmentSummary};
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
pub struct NewDepartment {
    #[validate(length(min = 2, max = 64))]
    name: String,
}

#[derive(Deserialize)]
pub struct DepartmentQueryParams {
    name: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn name_taken(pool: &PgPool, name: &str, except: Option<Uuid>) -> Result<bool, AppError> {
    Ok(sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM departments WHERE LOWER(name) = LOWER($1) \
         AND ($2::uuid IS NULL OR department_id != $2))",
    )
    .bind(name)
    .bind(except)
    .fetch_one(pool)
    .await?)
}

pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    new_department: web::Json<NewDepartment>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    validate_payload(&new_department.0)?;

    if name_taken(&pool, &new_department.name, None).await? {
        return Err(AppError::Conflict("Department name already exists".to_string()));
    }

    let now = Utc::now();
    let department = sqlx::query_as::<_, Department>(
        "INSERT INTO departments (department_id, name, created_at, updated_at) \
         VALUES ($1, $2, $3, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&new_department.name)
    .bind(now)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(department))
}

pub async fn get_departments(
    _auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<DepartmentQueryParams>,
) -> Result<HttpResponse, AppError> {
    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT d.department_id, d.name, COUNT(e.employee_id) AS active_employees \
         FROM departments d \
         LEFT JOIN employees e ON e.department_id = d.department_id AND e.is_active",
    );

    if let Some(name) = &query.name {
        query_builder.push(" WHERE d.name ILIKE ");
        query_builder.push_bind(format!("%{}%", name));
    }

    let (limit, offset) = page(query.limit, query.offset);
    query_builder.push(" GROUP BY d.department_id, d.name ORDER BY d.name LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let departments = query_builder
        .build_query_as::<DepartmentSummary>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(departments))
}

pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    department_id: web::Path<Uuid>,
    updates: web::Json<NewDepartment>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    validate_payload(&updates.0)?;
    let department_id = department_id.into_inner();

    if name_taken(&pool, &updates.name, Some(department_id)).await? {
        return Err(AppError::Conflict("Department name already exists".to_string()));
    }

    let department = sqlx::query_as::<_, Department>(
        "UPDATE departments SET name = $1, updated_at = $2 WHERE department_id = $3 RETURNING *",
    )
    .bind(&updates.name)
    .bind(Utc::now())
    .bind(department_id)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Department not found".to_string()))?;

    Ok(HttpResponse::Ok().json(department))
}

pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    department_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    let department_id = department_id.into_inner();

    let in_use: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM employees WHERE department_id = $1)")
        .bind(department_id)
        .fetch_one(&**pool)
        .await?;
    if in_use {
        return Err(AppError::Conflict("Department still contains employees".to_string()));
    }

    let result = sqlx::query("DELETE FROM departments WHERE department_id = $1")
        .bind(department_id)
        .execute(&**pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Department not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Department deleted successfully",
    })))
}

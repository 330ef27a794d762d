use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::page;
use crate::models::task_report::{TaskReport, TaskReportWithEmployee};
use crate::services::leave;
use crate::services::task_report::{self, Period, TaskItem};
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

const MAX_TASKS_PER_REPORT: usize = 50;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_task_list"))]
pub struct NewTaskReport {
    /// Defaults to today at the office.
    report_date: Option<NaiveDate>,
    #[validate]
    tasks: Vec<TaskItem>,
    #[validate(length(max = 2000))]
    summary: Option<String>,
}

fn validate_task_list(report: &NewTaskReport) -> Result<(), ValidationError> {
    if report.tasks.is_empty() || report.tasks.len() > MAX_TASKS_PER_REPORT {
        return Err(ValidationError::new("a report lists between 1 and 50 tasks"));
    }
    let hours: f64 = report.tasks.iter().map(|task| task.hours).sum();
    if hours > 24.0 {
        return Err(ValidationError::new("task hours exceed a day"));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReportQueryParams {
    employee_id: Option<Uuid>,
    date: Option<NaiveDate>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct TaskOverviewParams {
    period: Option<Period>,
}

/// Files the caller's report for a day. A second submission for the same
/// day replaces the first.
pub async fn submit_task_report(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    report: web::Json<NewTaskReport>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&report.0)?;
    let employee_id = auth.own_employee_id()?;
    let today = config.office_today();
    let report_date = report.report_date.unwrap_or(today);
    if report_date > today {
        return Err(AppError::BadRequest("Cannot report tasks for a future date".to_string()));
    }

    let now = Utc::now();
    let saved = sqlx::query_as::<_, TaskReport>(
        "INSERT INTO task_reports (report_id, employee_id, report_date, tasks, summary, created_at, \
         updated_at) VALUES ($1, $2, $3, $4, $5, $6, $6) \
         ON CONFLICT (employee_id, report_date) DO UPDATE SET tasks = EXCLUDED.tasks, \
         summary = EXCLUDED.summary, updated_at = EXCLUDED.updated_at \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(report_date)
    .bind(Json(&report.tasks))
    .bind(&report.summary)
    .bind(now)
    .fetch_one(&**pool)
    .await?;

    info!("Task report for {} filed by {}", saved.report_date, employee_id);
    Ok(HttpResponse::Ok().json(saved))
}

pub async fn get_task_reports(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<TaskReportQueryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_to(query.employee_id)?;

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT r.*, e.name AS employee_name FROM task_reports r \
         JOIN employees e ON e.employee_id = r.employee_id WHERE TRUE",
    );
    if let Some(employee_id) = employee_id {
        query_builder.push(" AND r.employee_id = ");
        query_builder.push_bind(employee_id);
    }
    // `date` picks one day; otherwise a single bound is a one-day window
    let window = match query.date {
        Some(date) => Some((date, date)),
        None => query.from.or(query.to).zip(query.to.or(query.from)),
    };
    if let Some((from, to)) = window {
        leave::day_count(from, to)?;
        query_builder.push(" AND r.report_date BETWEEN ");
        query_builder.push_bind(from);
        query_builder.push(" AND ");
        query_builder.push_bind(to);
    }

    let (limit, offset) = page(query.limit, query.offset);
    query_builder.push(" ORDER BY r.report_date DESC, e.name LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let reports = query_builder
        .build_query_as::<TaskReportWithEmployee>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(reports))
}

/// Reporting and completion figures across active employees.
pub async fn get_task_report_overview(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<TaskOverviewParams>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let period = query.period.unwrap_or_default();
    let (from, to) = period.range(config.office_today());

    let total_employees: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE is_active")
        .fetch_one(&**pool)
        .await?;
    let reports: Vec<(Uuid, Json<Vec<TaskItem>>)> = sqlx::query_as(
        "SELECT r.employee_id, r.tasks FROM task_reports r \
         JOIN employees e ON e.employee_id = r.employee_id \
         WHERE e.is_active AND r.report_date BETWEEN $1 AND $2",
    )
    .bind(from)
    .bind(to)
    .fetch_all(&**pool)
    .await?;

    let statistics = task_report::overview(
        total_employees,
        reports.iter().map(|(employee_id, tasks)| (*employee_id, tasks.0.as_slice())),
    );

    Ok(HttpResponse::Ok().json(json!({
        "period": period,
        "from": from,
        "to": to,
        "statistics": statistics,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(tasks: serde_json::Value) -> NewTaskReport {
        serde_json::from_value(json!({ "tasks": tasks, "summary": "steady day" })).unwrap()
    }

    #[test]
    fn report_needs_at_least_one_task() {
        assert!(report(json!([])).validate().is_err());
        let filed = report(json!([{ "title": "reconcile leave", "hours": 2.5, "status": "completed" }]));
        assert!(filed.validate().is_ok());
        assert!(filed.report_date.is_none());
    }

    #[test]
    fn task_hours_cannot_exceed_a_day() {
        let filed = report(json!([
            { "title": "audit", "hours": 14.0, "status": "in_progress" },
            { "title": "handover", "hours": 11.0, "status": "completed" }
        ]));
        assert!(filed.validate().is_err());
    }

    #[test]
    fn unknown_task_status_is_rejected() {
        let parsed = serde_json::from_value::<NewTaskReport>(json!({
            "tasks": [{ "title": "audit", "hours": 1.0, "status": "abandoned" }]
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn overview_period_parses_snake_case() {
        let params: TaskOverviewParams = serde_json::from_value(json!({ "period": "last_month" })).unwrap();
        assert_eq!(params.period, Some(Period::LastMonth));
    }
}

use actix_web::{web, HttpResponse};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use log::info;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::employee::fetch_employee;
use crate::handlers::page;
use crate::handlers::settings::load_settings;
use crate::models::attendance::{Attendance, AttendanceWithEmployee};
use crate::services::attendance::{self, AttendancePolicy, AttendanceStatus};
use crate::services::leave;
use crate::utils::auth::AuthUser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQueryParams {
    employee_id: Option<Uuid>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    status: Option<AttendanceStatus>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct OverviewParams {
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryParams {
    employee_id: Option<Uuid>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

const MAX_SUMMARY_DAYS: i32 = 366;

/// Punches are stored to the minute.
fn clock(now: chrono::NaiveDateTime) -> NaiveTime {
    let time = now.time();
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

pub async fn find_record(
    conn: &mut PgConnection,
    employee_id: Uuid,
    date: NaiveDate,
) -> Result<Option<Attendance>, AppError> {
    Ok(sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE employee_id = $1 AND date = $2")
        .bind(employee_id)
        .bind(date)
        .fetch_optional(conn)
        .await?)
}

/// Writes the punches for a day, deriving the status from the policy.
/// Approved work-from-home days keep their status.
pub async fn upsert_punches(
    conn: &mut PgConnection,
    policy: &AttendancePolicy,
    employee_id: Uuid,
    date: NaiveDate,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
) -> Result<Attendance, AppError> {
    let existing = find_record(&mut *conn, employee_id, date).await?;
    let current = existing.as_ref().and_then(|record| AttendanceStatus::parse(&record.status));
    let status = attendance::status_after_punches(current, check_in, check_out, policy);
    write_record(conn, employee_id, date, check_in, check_out, status).await
}

/// Inserts or replaces the day's record with an explicit status.
pub async fn write_record(
    conn: &mut PgConnection,
    employee_id: Uuid,
    date: NaiveDate,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    status: AttendanceStatus,
) -> Result<Attendance, AppError> {
    let work_hours = match (check_in, check_out) {
        (Some(check_in), Some(check_out)) => Some(attendance::worked_hours(check_in, check_out)),
        _ => None,
    };
    let now = Utc::now();
    Ok(sqlx::query_as::<_, Attendance>(
        "INSERT INTO attendance (attendance_id, employee_id, date, check_in, check_out, work_hours, status, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
         ON CONFLICT (employee_id, date) DO UPDATE SET check_in = EXCLUDED.check_in, \
         check_out = EXCLUDED.check_out, work_hours = EXCLUDED.work_hours, status = EXCLUDED.status, \
         updated_at = EXCLUDED.updated_at \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(date)
    .bind(check_in)
    .bind(check_out)
    .bind(work_hours)
    .bind(status.as_str())
    .bind(now)
    .fetch_one(conn)
    .await?)
}

/// Flags a day as worked from home, keeping any punches already recorded.
pub async fn mark_work_from_home(
    conn: &mut PgConnection,
    employee_id: Uuid,
    date: NaiveDate,
) -> Result<(), AppError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO attendance (attendance_id, employee_id, date, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $5) \
         ON CONFLICT (employee_id, date) DO UPDATE SET status = EXCLUDED.status, \
         updated_at = EXCLUDED.updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(date)
    .bind(AttendanceStatus::WorkFromHome.as_str())
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Drops the day's record entirely.
pub async fn remove_record(conn: &mut PgConnection, employee_id: Uuid, date: NaiveDate) -> Result<(), AppError> {
    sqlx::query("DELETE FROM attendance WHERE employee_id = $1 AND date = $2")
        .bind(employee_id)
        .bind(date)
        .execute(conn)
        .await?;
    Ok(())
}

/// Takes the work-from-home flag off a day. Days without punches are
/// removed, the rest get the status their punches earn.
pub async fn clear_work_from_home(
    conn: &mut PgConnection,
    policy: &AttendancePolicy,
    employee_id: Uuid,
    date: NaiveDate,
) -> Result<(), AppError> {
    let Some(record) = find_record(&mut *conn, employee_id, date).await? else {
        return Ok(());
    };
    if AttendanceStatus::parse(&record.status) != Some(AttendanceStatus::WorkFromHome) {
        return Ok(());
    }
    match attendance::status_without_work_from_home(record.check_in, record.check_out, policy) {
        Some(status) => {
            write_record(conn, employee_id, date, record.check_in, record.check_out, status).await?;
        }
        None => remove_record(conn, employee_id, date).await?,
    }
    Ok(())
}

pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    let employee_id = auth.own_employee_id()?;
    let now = config.office_now();
    let mut tx = pool.begin().await?;
    let policy = load_settings(&mut *tx).await?.attendance_policy();

    if let Some(record) = find_record(&mut tx, employee_id, now.date()).await? {
        if record.check_in.is_some() {
            return Err(AppError::Conflict("Already checked in today".to_string()));
        }
    }

    let record = upsert_punches(&mut tx, &policy, employee_id, now.date(), Some(clock(now)), None).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(record))
}

pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    let employee_id = auth.own_employee_id()?;
    let now = config.office_now();
    let mut tx = pool.begin().await?;
    let policy = load_settings(&mut *tx).await?.attendance_policy();

    let record = find_record(&mut tx, employee_id, now.date())
        .await?
        .ok_or_else(|| AppError::Conflict("Check in before checking out".to_string()))?;
    if record.check_in.is_none() {
        return Err(AppError::Conflict("Check in before checking out".to_string()));
    }
    if record.check_out.is_some() {
        return Err(AppError::Conflict("Already checked out today".to_string()));
    }

    let record =
        upsert_punches(&mut tx, &policy, employee_id, now.date(), record.check_in, Some(clock(now))).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(record))
}

pub async fn get_attendance(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<AttendanceQueryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_to(query.employee_id)?;
    let to = query.to.unwrap_or_else(|| config.office_today());
    let from = query.from.unwrap_or(to - Duration::days(30));
    if to < from {
        return Err(AppError::BadRequest("'to' is before 'from'".to_string()));
    }

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT a.*, e.name AS employee_name FROM attendance a \
         JOIN employees e ON e.employee_id = a.employee_id WHERE a.date >= ",
    );
    query_builder.push_bind(from);
    query_builder.push(" AND a.date <= ");
    query_builder.push_bind(to);
    if let Some(employee_id) = employee_id {
        query_builder.push(" AND a.employee_id = ");
        query_builder.push_bind(employee_id);
    }
    if let Some(status) = query.status {
        query_builder.push(" AND a.status = ");
        query_builder.push_bind(status.as_str());
    }

    let (limit, offset) = page(query.limit, query.offset);
    query_builder.push(" ORDER BY a.date DESC, e.name LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let records = query_builder
        .build_query_as::<AttendanceWithEmployee>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "from": from,
        "to": to,
        "records": records,
    })))
}

pub async fn get_overview(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<OverviewParams>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let date = query.date.unwrap_or_else(|| config.office_today());

    let total_employees: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE is_active")
        .fetch_one(&**pool)
        .await?;
    let statuses: Vec<String> = sqlx::query_scalar(
        "SELECT a.status FROM attendance a JOIN employees e ON e.employee_id = a.employee_id \
         WHERE a.date = $1 AND e.is_active",
    )
    .bind(date)
    .fetch_all(&**pool)
    .await?;

    let statistics = attendance::overview(
        total_employees,
        statuses.iter().filter_map(|status| AttendanceStatus::parse(status)),
    );

    Ok(HttpResponse::Ok().json(json!({
        "date": date,
        "statistics": statistics,
    })))
}

/// Per-status counts and rates for one employee. Defaults to the current
/// month; days after today are not counted.
pub async fn get_attendance_summary(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<SummaryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = match auth.scope_to(query.employee_id)? {
        Some(employee_id) => employee_id,
        None => auth.own_employee_id()?,
    };
    let today = config.office_today();
    let to = query.to.unwrap_or(today);
    let from = query.from.unwrap_or_else(|| to.with_day(1).unwrap_or(to));
    leave::checked_span(from, to, MAX_SUMMARY_DAYS)?;
    let employee = fetch_employee(&pool, employee_id).await?;

    let counted_to = to.min(today);
    let records: Vec<(NaiveDate, String)> = sqlx::query_as(
        "SELECT date, status FROM attendance WHERE employee_id = $1 AND date >= $2 AND date <= $3",
    )
    .bind(employee_id)
    .bind(from)
    .bind(counted_to)
    .fetch_all(&**pool)
    .await?;

    let summary = attendance::summarize_range(
        from,
        counted_to,
        records
            .iter()
            .filter_map(|(date, status)| AttendanceStatus::parse(status).map(|status| (*date, status))),
    );

    Ok(HttpResponse::Ok().json(json!({
        "employeeId": employee.employee_id,
        "employeeName": employee.name,
        "from": from,
        "to": to,
        "summary": summary,
    })))
}

/// Days before today with a check-in and no check-out.
pub async fn get_missing_checkouts(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let records = sqlx::query_as::<_, AttendanceWithEmployee>(
        "SELECT a.*, e.name AS employee_name FROM attendance a \
         JOIN employees e ON e.employee_id = a.employee_id \
         WHERE a.date < $1 AND a.check_in IS NOT NULL AND a.check_out IS NULL AND e.is_active \
         ORDER BY a.date DESC LIMIT 500",
    )
    .bind(config.office_today())
    .fetch_all(&**pool)
    .await?;

    info!("{} missing check-outs found", records.len());
    Ok(HttpResponse::Ok().json(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punches_drop_seconds() {
        let now = NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(9, 41, 59)
            .unwrap();
        assert_eq!(clock(now), NaiveTime::from_hms_opt(9, 41, 0).unwrap());
    }

    #[test]
    fn summary_params_are_camel_case() {
        let params: SummaryParams = serde_json::from_value(json!({
            "employeeId": "7d7c3a1e-4b51-4f4a-9a0e-2f1d6c8b9e10",
            "from": "2025-06-01",
            "to": "2025-06-30"
        }))
        .unwrap();
        assert!(params.employee_id.is_some());
        assert_eq!(params.from, NaiveDate::from_ymd_opt(2025, 6, 1));
    }
}

use actix_web::{web, HttpResponse};
use chrono::{Datelike, NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::db::lock_employee_dates;
use crate::errors::AppError;
use crate::handlers::notification::{notify_employee, NotificationKind};
use crate::handlers::page;
use crate::models::leave::{Leave, LeaveWithEmployee};
use crate::services::leave::{self, LeaveType, RequestStatus};
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewLeave {
    leave_type: LeaveType,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[validate(length(min = 3, max = 500))]
    reason: String,
    /// Staff may file on behalf of an employee.
    employee_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveQueryParams {
    status: Option<RequestStatus>,
    employee_id: Option<Uuid>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveSummaryParams {
    year: Option<i32>,
    employee_id: Option<Uuid>,
}

/// Reviewer verdict, shared by every request that goes through review.
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub status: RequestStatus,
    #[validate(length(max = 500))]
    pub comment: Option<String>,
}

async fn fetch_leave(pool: &PgPool, leave_id: Uuid) -> Result<Leave, AppError> {
    sqlx::query_as::<_, Leave>("SELECT * FROM leaves WHERE leave_id = $1")
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Leave not found".to_string()))
}

fn stored_status(leave: &Leave) -> Result<RequestStatus, AppError> {
    RequestStatus::parse(&leave.status)
        .ok_or_else(|| AppError::InternalServerError(format!("Unknown leave status {}", leave.status)))
}

/// Whether a pending or approved leave of `employee_id`, other than
/// `except`, intersects `[start, end]`.
async fn clashes(
    conn: &mut PgConnection,
    employee_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    except: Option<Uuid>,
) -> Result<bool, AppError> {
    let mut overlap: sqlx::QueryBuilder<'_, sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT EXISTS(SELECT 1 FROM leaves WHERE status IN ('pending', 'approved') AND employee_id = ",
    );
    overlap.push_bind(employee_id);
    if let Some(leave_id) = except {
        overlap.push(" AND leave_id <> ");
        overlap.push_bind(leave_id);
    }
    overlap.push(" AND ");
    leave::push_overlap(&mut overlap, start, end);
    overlap.push(")");
    Ok(overlap.build_query_scalar().fetch_one(&mut *conn).await?)
}

pub async fn request_leave(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    new_leave: web::Json<NewLeave>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&new_leave.0)?;
    let employee_id = match new_leave.employee_id {
        Some(employee_id) => {
            auth.require_access_to(employee_id)?;
            employee_id
        }
        None => auth.own_employee_id()?,
    };
    let day_count = leave::checked_span(new_leave.start_date, new_leave.end_date, leave::MAX_LEAVE_DAYS)?;

    let mut tx = pool.begin().await?;
    lock_employee_dates(&mut tx, "leaves", employee_id).await?;
    if clashes(&mut tx, employee_id, new_leave.start_date, new_leave.end_date, None).await? {
        return Err(AppError::Conflict(
            "Leave overlaps an existing pending or approved leave".to_string(),
        ));
    }

    let now = Utc::now();
    let leave = sqlx::query_as::<_, Leave>(
        "INSERT INTO leaves (leave_id, employee_id, leave_type, start_date, end_date, day_count, reason, \
         status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $8) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(new_leave.leave_type.as_str())
    .bind(new_leave.start_date)
    .bind(new_leave.end_date)
    .bind(day_count)
    .bind(&new_leave.reason)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(leave))
}

pub async fn get_leaves(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<LeaveQueryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_to(query.employee_id)?;

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT l.*, e.name AS employee_name FROM leaves l \
         JOIN employees e ON e.employee_id = l.employee_id WHERE TRUE",
    );
    if let Some(employee_id) = employee_id {
        query_builder.push(" AND l.employee_id = ");
        query_builder.push_bind(employee_id);
    }
    if let Some(status) = query.status {
        query_builder.push(" AND l.status = ");
        query_builder.push_bind(status.as_str());
    }
    // a single bound means a one-day window
    if let (Some(window_start), Some(window_end)) = (query.from.or(query.to), query.to.or(query.from)) {
        leave::day_count(window_start, window_end)?;
        query_builder.push(" AND ");
        leave::push_overlap(&mut query_builder, window_start, window_end);
    }

    let (limit, offset) = page(query.limit, query.offset);
    query_builder.push(" ORDER BY l.start_date DESC LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let leaves = query_builder
        .build_query_as::<LeaveWithEmployee>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(leaves))
}

pub async fn get_leave_summary(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<LeaveSummaryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = match auth.scope_to(query.employee_id)? {
        Some(employee_id) => employee_id,
        None => auth.own_employee_id()?,
    };
    let year = query.year.unwrap_or_else(|| config.office_today().year());

    let (year_start, year_end) = NaiveDate::from_ymd_opt(year, 1, 1)
        .zip(NaiveDate::from_ymd_opt(year, 12, 31))
        .ok_or_else(|| AppError::BadRequest(format!("Year {year} is out of range")))?;

    // leaves crossing New Year count toward each year for the days inside it
    let rows: Vec<(String, NaiveDate, NaiveDate)> = sqlx::query_as(
        "SELECT leave_type, start_date, end_date FROM leaves \
         WHERE employee_id = $1 AND status = 'approved' AND start_date <= $3 AND end_date >= $2",
    )
    .bind(employee_id)
    .bind(year_start)
    .bind(year_end)
    .fetch_all(&**pool)
    .await?;

    let totals = leave::summarize(rows.into_iter().filter_map(|(leave_type, start, end)| {
        LeaveType::parse(&leave_type).map(|t| (t, leave::days_within(start, end, year_start, year_end)))
    }));

    Ok(HttpResponse::Ok().json(json!({
        "employeeId": employee_id,
        "year": year,
        "approvedDays": totals,
    })))
}

pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    leave_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let leave = fetch_leave(&pool, leave_id.into_inner()).await?;
    auth.require_access_to(leave.employee_id)?;
    Ok(HttpResponse::Ok().json(leave))
}

/// Withdraws a leave that has not been decided yet.
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    leave_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    let leave = fetch_leave(&pool, leave_id.into_inner()).await?;
    auth.require_access_to(leave.employee_id)?;
    if stored_status(&leave)? != RequestStatus::Pending {
        return Err(AppError::Conflict("Only pending leaves can be cancelled".to_string()));
    }

    sqlx::query("DELETE FROM leaves WHERE leave_id = $1 AND status = 'pending'")
        .bind(leave.leave_id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave cancelled successfully",
    })))
}

pub async fn update_leave_status(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    leave_id: web::Path<Uuid>,
    decision: web::Json<Decision>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&decision.0)?;
    let leave = fetch_leave(&pool, leave_id.into_inner()).await?;
    let current = stored_status(&leave)?;
    leave::check_transition(current, decision.status, auth.role)?;

    let mut tx = pool.begin().await?;
    if leave::reclaims_dates(current, decision.status) {
        lock_employee_dates(&mut tx, "leaves", leave.employee_id).await?;
        if clashes(&mut tx, leave.employee_id, leave.start_date, leave.end_date, Some(leave.leave_id)).await? {
            return Err(AppError::Conflict(
                "Leave now overlaps another pending or approved leave".to_string(),
            ));
        }
    }
    let updated = sqlx::query_as::<_, Leave>(
        "UPDATE leaves SET status = $1, approver_id = $2, approver_comment = $3, decided_at = $4, \
         updated_at = $4 WHERE leave_id = $5 AND status = $6 RETURNING *",
    )
    .bind(decision.status.as_str())
    .bind(auth.user_id)
    .bind(&decision.comment)
    .bind(Utc::now())
    .bind(leave.leave_id)
    .bind(current.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("Leave was updated concurrently".to_string()))?;

    let message = format!(
        "Your {} leave from {} to {} was {}",
        updated.leave_type,
        updated.start_date,
        updated.end_date,
        decision.status.as_str()
    );
    notify_employee(&mut *tx, updated.employee_id, NotificationKind::Leave, "Leave request update", &message)
        .await?;
    tx.commit().await?;

    info!(
        "Leave {} moved from {} to {} by {}",
        updated.leave_id,
        current.as_str(),
        decision.status.as_str(),
        auth.user_id
    );
    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_type_must_be_known() {
        let result = serde_json::from_value::<NewLeave>(json!({
            "leaveType": "vacation",
            "startDate": "2025-05-01",
            "endDate": "2025-05-02",
            "reason": "trip"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn decision_parses_status() {
        let decision: Decision =
            serde_json::from_value(json!({ "status": "approved", "comment": "enjoy" })).unwrap();
        assert_eq!(decision.status, RequestStatus::Approved);
        assert!(decision.validate().is_ok());
    }
}

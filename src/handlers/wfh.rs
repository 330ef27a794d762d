use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::db::lock_employee_dates;
use crate::errors::AppError;
use crate::handlers::attendance::{clear_work_from_home, mark_work_from_home};
use crate::handlers::leave::Decision;
use crate::handlers::notification::{notify_employee, NotificationKind};
use crate::handlers::page;
use crate::handlers::settings::load_settings;
use crate::models::attendance::WfhRequest;
use crate::services::leave::{self, RequestStatus};
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewWfhRequest {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[validate(length(min = 3, max = 500))]
    reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WfhQueryParams {
    status: Option<RequestStatus>,
    employee_id: Option<Uuid>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Every date from `start` to `end`, both included.
fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Whether a pending or approved request of `employee_id`, other than
/// `except`, intersects `[start, end]`.
async fn clashes(
    conn: &mut PgConnection,
    employee_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    except: Option<Uuid>,
) -> Result<bool, AppError> {
    let open: Vec<(Uuid, NaiveDate, NaiveDate)> = sqlx::query_as(
        "SELECT wfh_id, start_date, end_date FROM wfh_requests \
         WHERE employee_id = $1 AND status IN ('pending', 'approved')",
    )
    .bind(employee_id)
    .fetch_all(conn)
    .await?;
    Ok(open
        .iter()
        .filter(|(wfh_id, _, _)| Some(*wfh_id) != except)
        .any(|&(_, open_start, open_end)| leave::overlaps(open_start, open_end, start, end)))
}

pub async fn request_wfh(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    request: web::Json<NewWfhRequest>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&request.0)?;
    let employee_id = auth.own_employee_id()?;
    leave::checked_span(request.start_date, request.end_date, leave::MAX_WFH_DAYS)?;

    let mut tx = pool.begin().await?;
    lock_employee_dates(&mut tx, "wfh_requests", employee_id).await?;
    if clashes(&mut tx, employee_id, request.start_date, request.end_date, None).await? {
        return Err(AppError::Conflict(
            "Request overlaps an existing pending or approved work-from-home request".to_string(),
        ));
    }

    let now = Utc::now();
    let wfh = sqlx::query_as::<_, WfhRequest>(
        "INSERT INTO wfh_requests (wfh_id, employee_id, start_date, end_date, reason, status, created_at, \
         updated_at) VALUES ($1, $2, $3, $4, $5, 'pending', $6, $6) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(&request.reason)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(wfh))
}

pub async fn get_wfh_requests(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<WfhQueryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_to(query.employee_id)?;

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> =
        sqlx::QueryBuilder::new("SELECT * FROM wfh_requests WHERE TRUE");
    if let Some(employee_id) = employee_id {
        query_builder.push(" AND employee_id = ");
        query_builder.push_bind(employee_id);
    }
    if let Some(status) = query.status {
        query_builder.push(" AND status = ");
        query_builder.push_bind(status.as_str());
    }

    let (limit, offset) = page(query.limit, query.offset);
    query_builder.push(" ORDER BY start_date DESC LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let requests = query_builder
        .build_query_as::<WfhRequest>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(requests))
}

pub async fn review_wfh(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    wfh_id: web::Path<Uuid>,
    decision: web::Json<Decision>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&decision.0)?;
    let wfh = sqlx::query_as::<_, WfhRequest>("SELECT * FROM wfh_requests WHERE wfh_id = $1")
        .bind(wfh_id.into_inner())
        .fetch_optional(&**pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Work-from-home request not found".to_string()))?;
    let current = RequestStatus::parse(&wfh.status)
        .ok_or_else(|| AppError::InternalServerError(format!("Unknown request status {}", wfh.status)))?;
    leave::check_transition(current, decision.status, auth.role)?;

    let mut tx = pool.begin().await?;
    if leave::reclaims_dates(current, decision.status) {
        lock_employee_dates(&mut tx, "wfh_requests", wfh.employee_id).await?;
        if clashes(&mut tx, wfh.employee_id, wfh.start_date, wfh.end_date, Some(wfh.wfh_id)).await? {
            return Err(AppError::Conflict(
                "Request now overlaps another pending or approved work-from-home request".to_string(),
            ));
        }
    }
    let updated = sqlx::query_as::<_, WfhRequest>(
        "UPDATE wfh_requests SET status = $1, reviewer_id = $2, reviewer_comment = $3, decided_at = $4, \
         updated_at = $4 WHERE wfh_id = $5 AND status = $6 RETURNING *",
    )
    .bind(decision.status.as_str())
    .bind(auth.user_id)
    .bind(&decision.comment)
    .bind(Utc::now())
    .bind(wfh.wfh_id)
    .bind(current.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("Request was updated concurrently".to_string()))?;

    if decision.status == RequestStatus::Approved {
        for day in days(updated.start_date, updated.end_date) {
            mark_work_from_home(&mut tx, updated.employee_id, day).await?;
        }
    } else if current == RequestStatus::Approved {
        let policy = load_settings(&mut *tx).await?.attendance_policy();
        for day in days(updated.start_date, updated.end_date) {
            clear_work_from_home(&mut tx, &policy, updated.employee_id, day).await?;
        }
    }

    let message = format!(
        "Your work-from-home request from {} to {} was {}",
        updated.start_date,
        updated.end_date,
        decision.status.as_str()
    );
    notify_employee(
        &mut *tx,
        updated.employee_id,
        NotificationKind::WorkFromHome,
        "Work-from-home update",
        &message,
    )
    .await?;
    tx.commit().await?;

    info!(
        "Work-from-home request {} moved to {} by {}",
        updated.wfh_id,
        decision.status.as_str(),
        auth.user_id
    );
    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_cover_range_inclusively() {
        let start = NaiveDate::from_ymd_opt(2025, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let covered: Vec<NaiveDate> = days(start, end).collect();
        assert_eq!(covered.len(), 4);
        assert_eq!(covered[0], start);
        assert_eq!(covered[3], end);
        assert_eq!(days(start, start).count(), 1);
    }
}

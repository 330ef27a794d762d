use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, NaiveTime, Utc};
use log::info;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::attendance::{find_record, remove_record, upsert_punches, write_record};
use crate::handlers::leave::Decision;
use crate::handlers::notification::{notify_employee, NotificationKind};
use crate::handlers::page;
use crate::handlers::settings::load_settings;
use crate::models::attendance::Regularization;
use crate::services::attendance::AttendanceStatus;
use crate::services::leave::{check_transition, RequestStatus};
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_punch_order"))]
pub struct NewRegularization {
    date: NaiveDate,
    check_in: NaiveTime,
    check_out: NaiveTime,
    #[validate(length(min = 3, max = 500))]
    reason: String,
}

fn validate_punch_order(request: &NewRegularization) -> Result<(), ValidationError> {
    if request.check_out <= request.check_in {
        return Err(ValidationError::new("checkOut must be after checkIn"));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularizationQueryParams {
    status: Option<RequestStatus>,
    employee_id: Option<Uuid>,
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn request_regularization(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    request: web::Json<NewRegularization>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&request.0)?;
    let employee_id = auth.own_employee_id()?;
    if request.date > config.office_today() {
        return Err(AppError::BadRequest("Cannot regularize a future date".to_string()));
    }

    let pending: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM regularizations \
         WHERE employee_id = $1 AND date = $2 AND status = 'pending')",
    )
    .bind(employee_id)
    .bind(request.date)
    .fetch_one(&**pool)
    .await?;
    if pending {
        return Err(AppError::Conflict(
            "A regularization for this date is already pending".to_string(),
        ));
    }

    let now = Utc::now();
    let regularization = sqlx::query_as::<_, Regularization>(
        "INSERT INTO regularizations (regularization_id, employee_id, date, check_in, check_out, reason, \
         status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $7) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(request.date)
    .bind(request.check_in)
    .bind(request.check_out)
    .bind(&request.reason)
    .bind(now)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(regularization))
}

pub async fn get_regularizations(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<RegularizationQueryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_to(query.employee_id)?;

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> =
        sqlx::QueryBuilder::new("SELECT * FROM regularizations WHERE TRUE");
    if let Some(employee_id) = employee_id {
        query_builder.push(" AND employee_id = ");
        query_builder.push_bind(employee_id);
    }
    if let Some(status) = query.status {
        query_builder.push(" AND status = ");
        query_builder.push_bind(status.as_str());
    }

    let (limit, offset) = page(query.limit, query.offset);
    query_builder.push(" ORDER BY created_at DESC LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let regularizations = query_builder
        .build_query_as::<Regularization>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(regularizations))
}

/// Status to put back when an approval is withdrawn; `None` when the
/// approval created the day's record.
fn restored_status(previous: Option<&str>) -> Result<Option<AttendanceStatus>, AppError> {
    previous
        .map(|status| {
            AttendanceStatus::parse(status)
                .ok_or_else(|| AppError::InternalServerError(format!("Unknown attendance status {status}")))
        })
        .transpose()
}

/// Approval rewrites the day's punches and re-derives its status, keeping
/// the record it replaced. Withdrawing an approval puts that record back.
pub async fn review_regularization(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    regularization_id: web::Path<Uuid>,
    decision: web::Json<Decision>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&decision.0)?;
    let regularization = sqlx::query_as::<_, Regularization>(
        "SELECT * FROM regularizations WHERE regularization_id = $1",
    )
    .bind(regularization_id.into_inner())
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Regularization not found".to_string()))?;
    let current = RequestStatus::parse(&regularization.status).ok_or_else(|| {
        AppError::InternalServerError(format!("Unknown regularization status {}", regularization.status))
    })?;
    check_transition(current, decision.status, auth.role)?;

    let mut tx = pool.begin().await?;
    let mut updated = sqlx::query_as::<_, Regularization>(
        "UPDATE regularizations SET status = $1, reviewer_id = $2, reviewer_comment = $3, decided_at = $4, \
         updated_at = $4 WHERE regularization_id = $5 AND status = $6 RETURNING *",
    )
    .bind(decision.status.as_str())
    .bind(auth.user_id)
    .bind(&decision.comment)
    .bind(Utc::now())
    .bind(regularization.regularization_id)
    .bind(current.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("Regularization was updated concurrently".to_string()))?;

    if decision.status == RequestStatus::Approved {
        let policy = load_settings(&mut *tx).await?.attendance_policy();
        let before = find_record(&mut tx, updated.employee_id, updated.date).await?;
        updated = sqlx::query_as::<_, Regularization>(
            "UPDATE regularizations SET previous_check_in = $1, previous_check_out = $2, \
             previous_status = $3 WHERE regularization_id = $4 RETURNING *",
        )
        .bind(before.as_ref().and_then(|record| record.check_in))
        .bind(before.as_ref().and_then(|record| record.check_out))
        .bind(before.as_ref().map(|record| record.status.as_str()))
        .bind(updated.regularization_id)
        .fetch_one(&mut *tx)
        .await?;
        upsert_punches(
            &mut tx,
            &policy,
            updated.employee_id,
            updated.date,
            Some(updated.check_in),
            Some(updated.check_out),
        )
        .await?;
    } else if current == RequestStatus::Approved {
        match restored_status(updated.previous_status.as_deref())? {
            Some(status) => {
                write_record(
                    &mut tx,
                    updated.employee_id,
                    updated.date,
                    updated.previous_check_in,
                    updated.previous_check_out,
                    status,
                )
                .await?;
            }
            None => remove_record(&mut tx, updated.employee_id, updated.date).await?,
        }
    }

    let message = format!(
        "Your attendance regularization for {} was {}",
        updated.date,
        decision.status.as_str()
    );
    notify_employee(
        &mut *tx,
        updated.employee_id,
        NotificationKind::Regularization,
        "Regularization update",
        &message,
    )
    .await?;
    tx.commit().await?;

    info!(
        "Regularization {} moved to {} by {}",
        updated.regularization_id,
        decision.status.as_str(),
        auth.user_id
    );
    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn check_out_must_follow_check_in() {
        let request: NewRegularization = serde_json::from_value(json!({
            "date": "2025-06-02",
            "checkIn": "18:00:00",
            "checkOut": "09:30:00",
            "reason": "forgot to punch"
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: NewRegularization = serde_json::from_value(json!({
            "date": "2025-06-02",
            "checkIn": "09:30:00",
            "checkOut": "18:00:00",
            "reason": "forgot to punch"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn withdrawn_approval_restores_prior_record() {
        assert_eq!(restored_status(None).unwrap(), None);
        assert_eq!(restored_status(Some("late")).unwrap(), Some(AttendanceStatus::Late));
        assert_eq!(
            restored_status(Some("work_from_home")).unwrap(),
            Some(AttendanceStatus::WorkFromHome)
        );
        assert!(restored_status(Some("holiday")).is_err());
    }
}

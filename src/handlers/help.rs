use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::AppError;
use crate::handlers::notification::{notify_employee, NotificationKind};
use crate::handlers::page;
use crate::models::help::HelpInquiry;
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryStatus::Open => "open",
            InquiryStatus::InProgress => "in_progress",
            InquiryStatus::Resolved => "resolved",
            InquiryStatus::Closed => "closed",
        }
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewInquiry {
    #[validate(length(min = 3, max = 120))]
    subject: String,
    #[validate(length(min = 3, max = 2000))]
    message: String,
    #[serde(default = "default_priority")]
    priority: Priority,
}

fn default_priority() -> Priority {
    Priority::Medium
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_inquiry_update"))]
pub struct InquiryUpdate {
    status: Option<InquiryStatus>,
    #[validate(length(min = 1, max = 2000))]
    response: Option<String>,
}

fn validate_inquiry_update(update: &InquiryUpdate) -> Result<(), ValidationError> {
    if update.status.is_none() && update.response.is_none() {
        return Err(ValidationError::new("status or response is required"));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryQueryParams {
    status: Option<InquiryStatus>,
    employee_id: Option<Uuid>,
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn create_inquiry(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    inquiry: web::Json<NewInquiry>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&inquiry.0)?;
    let employee_id = auth.own_employee_id()?;

    let now = Utc::now();
    let inquiry = sqlx::query_as::<_, HelpInquiry>(
        "INSERT INTO help_inquiries (inquiry_id, employee_id, subject, message, priority, status, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, 'open', $6, $6) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(&inquiry.subject)
    .bind(&inquiry.message)
    .bind(inquiry.priority.as_str())
    .bind(now)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(inquiry))
}

pub async fn get_inquiries(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<InquiryQueryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_to(query.employee_id)?;

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> =
        sqlx::QueryBuilder::new("SELECT * FROM help_inquiries WHERE TRUE");
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

    let inquiries = query_builder
        .build_query_as::<HelpInquiry>()
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(inquiries))
}

pub async fn update_inquiry(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    inquiry_id: web::Path<Uuid>,
    update: web::Json<InquiryUpdate>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_staff()?;
    validate_payload(&update.0)?;

    let mut tx = pool.begin().await?;
    let inquiry = sqlx::query_as::<_, HelpInquiry>(
        "UPDATE help_inquiries SET status = COALESCE($1, status), response = COALESCE($2, response), \
         responded_by = CASE WHEN $2::text IS NULL THEN responded_by ELSE $3 END, updated_at = $4 \
         WHERE inquiry_id = $5 RETURNING *",
    )
    .bind(update.status.map(|status| status.as_str()))
    .bind(&update.response)
    .bind(auth.user_id)
    .bind(Utc::now())
    .bind(inquiry_id.into_inner())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Help inquiry not found".to_string()))?;

    if update.response.is_some() {
        let message = format!("Your inquiry \"{}\" has a new response", inquiry.subject);
        notify_employee(
            &mut *tx,
            inquiry.employee_id,
            NotificationKind::HelpInquiry,
            "Help inquiry answered",
            &message,
        )
        .await?;
    }
    tx.commit().await?;

    info!("Help inquiry {} updated by {}", inquiry.inquiry_id, auth.user_id);
    Ok(HttpResponse::Ok().json(inquiry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn priority_defaults_to_medium() {
        let inquiry: NewInquiry =
            serde_json::from_value(json!({ "subject": "Payslip", "message": "April slip missing" })).unwrap();
        assert_eq!(inquiry.priority, Priority::Medium);
        assert!(inquiry.validate().is_ok());
    }

    #[test]
    fn update_needs_status_or_response() {
        let update: InquiryUpdate = serde_json::from_value(json!({})).unwrap();
        assert!(update.validate().is_err());
        let update: InquiryUpdate = serde_json::from_value(json!({ "status": "in_progress" })).unwrap();
        assert_eq!(update.status, Some(InquiryStatus::InProgress));
        assert!(update.validate().is_ok());
    }
}

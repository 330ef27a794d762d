use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::page;
use crate::models::notification::Notification;
use crate::utils::auth::AuthUser;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Leave,
    Regularization,
    WorkFromHome,
    SalarySlip,
    HelpInquiry,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Leave => "leave",
            NotificationKind::Regularization => "regularization",
            NotificationKind::WorkFromHome => "wfh",
            NotificationKind::SalarySlip => "salary_slip",
            NotificationKind::HelpInquiry => "help_inquiry",
        }
    }
}

/// Queues an in-app notification for the login linked to `employee_id`.
/// Employees without a login are skipped.
pub async fn notify_employee<'e, E: PgExecutor<'e>>(
    executor: E,
    employee_id: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO notifications (notification_id, user_id, title, message, kind, is_read, created_at) \
         SELECT $1, user_id, $2, $3, $4, FALSE, $5 FROM users WHERE employee_id = $6",
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(message)
    .bind(kind.as_str())
    .bind(Utc::now())
    .bind(employee_id)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQueryParams {
    #[serde(default)]
    unread_only: bool,
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn get_notifications(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<NotificationQueryParams>,
) -> Result<HttpResponse, AppError> {
    let (limit, offset) = page(query.limit, query.offset);
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read) \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(auth.user_id)
    .bind(query.unread_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(&**pool)
    .await?;

    let unread: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
    )
    .bind(auth.user_id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "unread": unread,
        "notifications": notifications,
    })))
}

pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    notification_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let notification = sqlx::query_as::<_, Notification>(
        "UPDATE notifications SET is_read = TRUE WHERE notification_id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(notification_id.into_inner())
    .bind(auth.user_id)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

    Ok(HttpResponse::Ok().json(notification))
}

pub async fn mark_all_read(
    auth: AuthUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
        .bind(auth.user_id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "updated": result.rows_affected() })))
}

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;
use validator::ValidationErrors;

use crate::services::{leave::LeaveError, payroll::PayrollError, tax::TaxError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
    #[error("Database Error: {0}")]
    DatabaseError(String),
    #[error("Storage Error: {0}")]
    StorageError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InternalServerError(msg) => msg.clone(),
            AppError::DatabaseError(_) => "Database error".to_string(),
            AppError::StorageError(_) => "Storage error".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_)
            | AppError::DatabaseError(_)
            | AppError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse { error: self.public_message() })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Resource already exists".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest("Referenced resource does not exist".to_string())
            }
            _ => {
                error!("Database error: {:?}", err);
                AppError::DatabaseError(err.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        let mut details = err
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let errors = errs
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => format!("{}: {}", e.code, message),
                        None => e.code.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: [{}]", field, errors)
            })
            .collect::<Vec<_>>();
        details.sort();
        if details.is_empty() {
            // struct-level (schema) failures are not keyed by field
            return AppError::BadRequest(format!("Validation failed: {}", err));
        }
        AppError::BadRequest(format!("Validation failed: {}", details.join("; ")))
    }
}

impl From<TaxError> for AppError {
    fn from(err: TaxError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<LeaveError> for AppError {
    fn from(err: LeaveError) -> Self {
        match err {
            LeaveError::InvalidRange { .. } | LeaveError::SpanTooLong { .. } => {
                AppError::BadRequest(err.to_string())
            }
            LeaveError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            LeaveError::DecisionRequiresStaff | LeaveError::CorrectionRequiresAdmin => {
                AppError::Forbidden(err.to_string())
            }
        }
    }
}

impl From<PayrollError> for AppError {
    fn from(err: PayrollError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Reshapes extractor failures (malformed JSON, bad query strings) into the
/// same `{"error": ...}` body used everywhere else.
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

pub fn query_error_handler(
    err: actix_web::error::QueryPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

pub fn path_error_handler(
    err: actix_web::error::PathError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(length(min = 3))]
        name: String,
    }

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(AppError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::StorageError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn overlong_requests_are_bad_requests() {
        let err: AppError = LeaveError::SpanTooLong { days: 91, max: 90 }.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn validation_errors_name_the_field() {
        let err: AppError = Signup { name: "ab".into() }.validate().unwrap_err().into();
        match err {
            AppError::BadRequest(msg) => assert!(msg.contains("name"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[actix_web::test]
    async fn internal_details_are_not_leaked() {
        let resp = AppError::DatabaseError("password=hunter2".into()).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"Database error"}"#);
    }
}

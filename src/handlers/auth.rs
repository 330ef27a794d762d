use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::user::User;
use crate::utils::auth::Role;
use crate::utils::{jwt, password, validation::validate_payload};

#[derive(Deserialize, Validate)]
pub struct AuthRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 64))]
    password: String,
    #[validate(custom = "validate_action")]
    action: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    email: String,
    token: String,
    role: Role,
    employee_id: Option<Uuid>,
}

fn validate_action(action: &str) -> Result<(), validator::ValidationError> {
    if action != "create" && action != "login" {
        return Err(validator::ValidationError::new("Invalid action"));
    }
    Ok(())
}

fn issue_token(config: &Config, user_id: Uuid, role: Role, employee_id: Option<Uuid>) -> Result<String, AppError> {
    jwt::generate_token(&config.jwt_secret, user_id, role, employee_id)
        .map_err(|_| AppError::InternalServerError("Token generation error".to_string()))
}

pub async fn auth_handler(
    req: web::Json<AuthRequest>,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&req.0)?;

    match req.action.as_str() {
        "create" => {
            // Self-registration only bootstraps the first admin; everyone else
            // gets an account through onboarding.
            let mut tx = pool.begin().await?;
            sqlx::query("LOCK TABLE users IN EXCLUSIVE MODE").execute(&mut *tx).await?;
            let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(&mut *tx)
                .await?;
            if existing > 0 {
                return Err(AppError::Forbidden(
                    "Accounts are created by HR during onboarding".to_string(),
                ));
            }

            let password_hash = password::hash_password(&req.password)?;
            let user_id = Uuid::new_v4();
            let now = Utc::now();
            sqlx::query(
                "INSERT INTO users (user_id, email, password, role, employee_id, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, NULL, $5, $5)",
            )
            .bind(user_id)
            .bind(&req.email)
            .bind(&password_hash)
            .bind(Role::Admin.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            info!("Bootstrap admin {} created", user_id);
            let token = issue_token(&config, user_id, Role::Admin, None)?;
            Ok(HttpResponse::Created().json(AuthResponse {
                email: req.0.email.clone(),
                token,
                role: Role::Admin,
                employee_id: None,
            }))
        }
        _ => {
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(&req.email)
                .fetch_optional(&**pool)
                .await?
                .ok_or_else(|| {
                    warn!("Login attempt for unknown email");
                    AppError::Unauthorized("Invalid email or password".to_string())
                })?;

            password::verify_password(&req.password, &user.password)?;

            let role = Role::parse(&user.role)
                .ok_or_else(|| AppError::InternalServerError("Unknown role".to_string()))?;

            if let Some(employee_id) = user.employee_id {
                let active: bool = sqlx::query_scalar("SELECT is_active FROM employees WHERE employee_id = $1")
                    .bind(employee_id)
                    .fetch_one(&**pool)
                    .await?;
                if !active {
                    return Err(AppError::Unauthorized("Account is deactivated".to_string()));
                }
            }

            let token = issue_token(&config, user.user_id, role, user.employee_id)?;
            Ok(HttpResponse::Ok().json(AuthResponse {
                email: user.email,
                token,
                role,
                employee_id: user.employee_id,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_must_be_login_or_create() {
        let req = AuthRequest {
            email: "a@b.co".into(),
            password: "longenough".into(),
            action: "delete".into(),
        };
        assert!(req.validate().is_err());
        let req = AuthRequest { action: "login".into(), ..req };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn short_password_is_rejected() {
        let req = AuthRequest {
            email: "a@b.co".into(),
            password: "short".into(),
            action: "login".into(),
        };
        assert!(req.validate().is_err());
    }
}

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::errors::AppError;
use crate::models::employee::Employee;
use crate::models::user::{User, UserProfile};
use crate::utils::auth::AuthUser;
use crate::utils::{password, validation::validate_payload};

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserAccountUpdate {
    #[validate(email)]
    email: Option<String>,
    #[validate(length(min = 8, max = 64))]
    new_password: Option<String>,
    current_password: String,
}

async fn load_profile(pool: &PgPool, user: User) -> Result<UserProfile, AppError> {
    let employee = match user.employee_id {
        Some(employee_id) => {
            sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE employee_id = $1")
                .bind(employee_id)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    Ok(UserProfile { user_id: user.user_id, email: user.email, role: user.role, employee })
}

async fn fetch_user(pool: &PgPool, auth: &AuthUser) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
        .bind(auth.user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found or unauthorized".to_string()))
}

pub async fn get_user_profile(
    auth: AuthUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = fetch_user(&pool, &auth).await?;
    Ok(HttpResponse::Ok().json(load_profile(&pool, user).await?))
}

pub async fn update_user_account(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    updates: web::Json<UserAccountUpdate>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    validate_payload(&updates.0)?;
    let user = fetch_user(&pool, &auth).await?;
    password::verify_password(&updates.current_password, &user.password)?;

    if let Some(email) = &updates.email {
        let email_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND user_id != $2)",
        )
        .bind(email)
        .bind(auth.user_id)
        .fetch_one(&**pool)
        .await?;
        if email_exists {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
    }

    let new_hash = match &updates.new_password {
        Some(new_password) => Some(password::hash_password(new_password)?),
        None => None,
    };

    let mut query: sqlx::QueryBuilder<'_, sqlx::Postgres> = sqlx::QueryBuilder::new("UPDATE users SET ");
    let mut separated = query.separated(", ");
    if let Some(email) = &updates.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }
    if let Some(hash) = &new_hash {
        separated.push("password = ");
        separated.push_bind_unseparated(hash);
    }
    separated.push("updated_at = ");
    separated.push_bind_unseparated(Utc::now());
    query.push(" WHERE user_id = ");
    query.push_bind(auth.user_id);
    let mut tx = pool.begin().await?;
    query.build().execute(&mut *tx).await?;
    if let (Some(email), Some(employee_id)) = (&updates.email, user.employee_id) {
        sqlx::query("UPDATE employees SET email = $1, updated_at = $2 WHERE employee_id = $3")
            .bind(email)
            .bind(Utc::now())
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let user = fetch_user(&pool, &auth).await?;
    Ok(HttpResponse::Ok().json(load_profile(&pool, user).await?))
}

use actix_web::{web, HttpResponse};
use chrono::{NaiveTime, Utc};
use log::info;
use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};
use validator::{Validate, ValidationError};

use crate::errors::AppError;
use crate::models::settings::CompanySettings;
use crate::services::tax::TaxRegime;
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_thresholds"))]
pub struct SettingsUpdate {
    #[validate(length(min = 2, max = 64))]
    company_name: Option<String>,
    #[validate(url)]
    company_logo_uri: Option<String>,
    office_start: Option<NaiveTime>,
    #[validate(range(min = 0, max = 240))]
    late_grace_minutes: Option<i32>,
    #[validate(range(min = 0.0, max = 24.0))]
    half_day_hours: Option<f64>,
    #[validate(range(min = 0.0, max = 24.0))]
    absent_below_hours: Option<f64>,
    default_tax_regime: Option<TaxRegime>,
}

fn validate_thresholds(update: &SettingsUpdate) -> Result<(), ValidationError> {
    if let (Some(half_day), Some(absent)) = (update.half_day_hours, update.absent_below_hours) {
        if absent > half_day {
            return Err(ValidationError::new("absentBelowHours cannot exceed halfDayHours"));
        }
    }
    Ok(())
}

pub async fn load_settings<'e, E: PgExecutor<'e>>(executor: E) -> Result<CompanySettings, AppError> {
    sqlx::query_as::<_, CompanySettings>(
        "SELECT company_name, company_logo_uri, office_start, late_grace_minutes, half_day_hours, \
         absent_below_hours, default_tax_regime, updated_at FROM company_settings WHERE id = 1",
    )
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::InternalServerError("Company settings missing".to_string()))
}

pub async fn get_settings(
    _auth: AuthUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(load_settings(&**pool).await?))
}

pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    updates: web::Json<SettingsUpdate>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    auth.require_admin()?;
    validate_payload(&updates.0)?;

    let current = load_settings(&**pool).await?;
    let half_day = updates.half_day_hours.unwrap_or(current.half_day_hours);
    let absent = updates.absent_below_hours.unwrap_or(current.absent_below_hours);
    if absent > half_day {
        return Err(AppError::BadRequest(
            "absentBelowHours cannot exceed halfDayHours".to_string(),
        ));
    }

    let settings = sqlx::query_as::<_, CompanySettings>(
        "UPDATE company_settings SET company_name = $1, company_logo_uri = $2, office_start = $3, \
         late_grace_minutes = $4, half_day_hours = $5, absent_below_hours = $6, default_tax_regime = $7, \
         updated_at = $8 WHERE id = 1 \
         RETURNING company_name, company_logo_uri, office_start, late_grace_minutes, half_day_hours, \
         absent_below_hours, default_tax_regime, updated_at",
    )
    .bind(updates.company_name.as_ref().unwrap_or(&current.company_name))
    .bind(updates.company_logo_uri.as_ref().or(current.company_logo_uri.as_ref()))
    .bind(updates.office_start.unwrap_or(current.office_start))
    .bind(updates.late_grace_minutes.unwrap_or(current.late_grace_minutes))
    .bind(half_day)
    .bind(absent)
    .bind(
        updates
            .default_tax_regime
            .map(|regime| regime.as_str().to_string())
            .unwrap_or_else(|| current.default_tax_regime.clone()),
    )
    .bind(Utc::now())
    .fetch_one(&**pool)
    .await?;

    info!("Company settings updated by {}", auth.user_id);
    Ok(HttpResponse::Ok().json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thresholds_must_be_ordered() {
        let update: SettingsUpdate =
            serde_json::from_value(json!({ "halfDayHours": 2.0, "absentBelowHours": 3.0 })).unwrap();
        assert!(update.validate().is_err());
        let update: SettingsUpdate =
            serde_json::from_value(json!({ "halfDayHours": 4.0, "absentBelowHours": 2.0 })).unwrap();
        assert!(update.validate().is_ok());
    }

    #[test]
    fn office_start_parses_clock_time() {
        let update: SettingsUpdate =
            serde_json::from_value(json!({ "officeStart": "10:00:00", "defaultTaxRegime": "old" })).unwrap();
        assert_eq!(update.office_start, NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(update.default_tax_regime, Some(TaxRegime::Old));
    }
}

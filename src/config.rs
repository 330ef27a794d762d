use std::{env, fmt::Display, str::FromStr};

use chrono::FixedOffset;
use log::{info, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub bind_address: String,
    pub aws_region: Option<String>,
    pub s3_bucket: String,
    pub s3_public_base_url: Option<Url>,
    pub office_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = required("JWT_SECRET")?;

        let s3_public_base_url = match env::var("S3_PUBLIC_BASE_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(Url::parse(raw.trim()).map_err(|e| {
                ConfigError::Invalid { key: "S3_PUBLIC_BASE_URL", reason: e.to_string() }
            })?),
            _ => None,
        };

        let office_offset = office_offset(try_load("OFFICE_UTC_OFFSET_MINUTES", "330")?)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "10")?,
            jwt_secret,
            bind_address: try_load("BIND_ADDRESS", "127.0.0.1:8080")?,
            aws_region: env::var("AWS_REGION").ok(),
            s3_bucket: required("AWS_S3_BUCKET")?,
            s3_public_base_url,
            office_offset,
        })
    }

    /// Today's date at the office.
    pub fn office_today(&self) -> chrono::NaiveDate {
        chrono::Utc::now().with_timezone(&self.office_offset).date_naive()
    }

    /// Current wall-clock time at the office.
    pub fn office_now(&self) -> chrono::NaiveDateTime {
        chrono::Utc::now().with_timezone(&self.office_offset).naive_local()
    }

    /// Public URI of an uploaded object.
    pub fn object_uri(&self, key: &str) -> String {
        match &self.s3_public_base_url {
            Some(base) => match base.join(key) {
                Ok(url) => url.to_string(),
                Err(_) => format!("{}/{}", base.as_str().trim_end_matches('/'), key),
            },
            None => format!("https://{}.s3.amazonaws.com/{}", self.s3_bucket, key),
        }
    }
}

/// UTC offset of the office, given in minutes east of UTC.
fn office_offset(minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt).ok_or_else(|| ConfigError::Invalid {
        key: "OFFICE_UTC_OFFSET_MINUTES",
        reason: format!("{minutes} is out of range"),
    })
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    let value = env::var(key).map_err(|_| ConfigError::Missing(key))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(key));
    }
    Ok(value)
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse::<T>().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid { key, reason: e.to_string() }
    })
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/hrms_test".to_string(),
        database_max_connections: 1,
        jwt_secret: "test-secret".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        aws_region: None,
        s3_bucket: "hrms-docs".to_string(),
        s3_public_base_url: None,
        office_offset: FixedOffset::east_opt(330 * 60).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_uri_defaults_to_bucket_host() {
        let config = test_config();
        assert_eq!(
            config.object_uri("documents/a.png"),
            "https://hrms-docs.s3.amazonaws.com/documents/a.png"
        );
    }

    #[test]
    fn object_uri_uses_public_base() {
        let mut config = test_config();
        config.s3_public_base_url = Some(Url::parse("https://cdn.example.com/files/").unwrap());
        assert_eq!(
            config.object_uri("documents/a.png"),
            "https://cdn.example.com/files/documents/a.png"
        );
    }

    #[test]
    fn office_offset_is_ist_by_default() {
        let config = test_config();
        assert_eq!(config.office_offset.local_minus_utc(), 19_800);
    }

    #[test]
    fn office_offset_rejects_out_of_range_minutes() {
        assert_eq!(office_offset(330).unwrap().local_minus_utc(), 19_800);
        assert_eq!(office_offset(-300).unwrap().local_minus_utc(), -18_000);
        assert!(matches!(office_offset(1_440), Err(ConfigError::Invalid { .. })));
        assert!(matches!(office_offset(100_000_000), Err(ConfigError::Invalid { .. })));
        assert!(matches!(office_offset(i32::MIN), Err(ConfigError::Invalid { .. })));
    }
}

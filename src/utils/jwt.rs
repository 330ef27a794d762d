use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::auth::Role;

pub const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User id
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<Uuid>,
    pub exp: usize, // Expiration timestamp
}

pub fn generate_token(
    secret: &str,
    user_id: Uuid,
    role: Role,
    employee_id: Option<Uuid>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        employee_id,
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_carries_role_and_employee() {
        let user_id = Uuid::new_v4();
        let employee_id = Uuid::new_v4();
        let token = generate_token("s3cret", user_id, Role::Hr, Some(employee_id)).unwrap();
        let claims = validate_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::Hr);
        assert_eq!(claims.employee_id, Some(employee_id));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token("s3cret", Uuid::new_v4(), Role::Admin, None).unwrap();
        assert!(validate_token("other", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: Role::Employee,
            employee_id: None,
            exp: (chrono::Utc::now() - chrono::Duration::days(1)).timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"s3cret")).unwrap();
        assert!(validate_token("s3cret", &token).is_err());
    }
}

//! Bearer-token authentication and role gates.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::utils::jwt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Hr,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Hr => "hr",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "employee" => Some(Role::Employee),
            "hr" => Some(Role::Hr),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// hr and admin may act on any employee's records.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Hr | Role::Admin)
    }
}

/// The caller, decoded from the `Authorization: Bearer` header.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub employee_id: Option<Uuid>,
}

impl AuthUser {
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR or admin role required".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }

    /// Employees may only touch their own records.
    pub fn require_access_to(&self, employee_id: Uuid) -> Result<(), AppError> {
        if self.role.is_staff() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not allowed to access this employee's records".to_string()))
        }
    }

    /// The employee record linked to this login.
    pub fn own_employee_id(&self) -> Result<Uuid, AppError> {
        self.employee_id
            .ok_or_else(|| AppError::BadRequest("Account is not linked to an employee".to_string()))
    }

    /// Employee filter for list endpoints: staff may ask for anyone (or
    /// everyone), other roles are pinned to themselves.
    pub fn scope_to(&self, requested: Option<Uuid>) -> Result<Option<Uuid>, AppError> {
        if self.role.is_staff() {
            return Ok(requested);
        }
        let own = self.own_employee_id()?;
        match requested {
            Some(id) if id != own => Err(AppError::Forbidden(
                "Not allowed to access this employee's records".to_string(),
            )),
            _ => Ok(Some(own)),
        }
    }

    /// Re-reads the account behind the token so that deactivation and role
    /// changes take effect before the token expires. Write handlers call
    /// this before touching any record.
    pub async fn verified(self, pool: &PgPool) -> Result<AuthUser, AppError> {
        let account: Option<(String, Option<Uuid>, Option<bool>)> = sqlx::query_as(
            "SELECT u.role, u.employee_id, e.is_active FROM users u \
             LEFT JOIN employees e ON e.employee_id = u.employee_id WHERE u.user_id = $1",
        )
        .bind(self.user_id)
        .fetch_optional(pool)
        .await?;
        let (role, employee_id) = current_account(account)?;
        if role != self.role {
            info!("User {} acts as {} (token says {})", self.user_id, role.as_str(), self.role.as_str());
        }
        Ok(AuthUser { user_id: self.user_id, role, employee_id })
    }
}

/// Role and employee link of a stored account; missing users and
/// deactivated employees are refused.
fn current_account(
    account: Option<(String, Option<Uuid>, Option<bool>)>,
) -> Result<(Role, Option<Uuid>), AppError> {
    let (role, employee_id, is_active) =
        account.ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;
    if is_active == Some(false) {
        return Err(AppError::Unauthorized("Account is deactivated".to_string()));
    }
    let role = Role::parse(&role)
        .ok_or_else(|| AppError::InternalServerError(format!("Unknown role {role}")))?;
    Ok((role, employee_id))
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| AppError::InternalServerError("Configuration missing".to_string()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|auth| auth.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    let claims = jwt::validate_token(&config.jwt_secret, token).map_err(|err| {
        warn!("Rejected token on {}: {}", req.path(), err);
        AppError::Unauthorized("Invalid token".to_string())
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

    Ok(AuthUser { user_id, role: claims.role, employee_id: claims.employee_id })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use actix_web::{http::StatusCode, test as actix_test, App, HttpResponse};

    async fn whoami(user: AuthUser) -> Result<HttpResponse, AppError> {
        user.require_staff()?;
        Ok(HttpResponse::Ok().body(user.role.as_str()))
    }

    fn token(role: Role) -> String {
        jwt::generate_token(&test_config().jwt_secret, Uuid::new_v4(), role, Some(Uuid::new_v4()))
            .unwrap()
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;
        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/whoami").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn garbage_token_is_unauthorized() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;
        let req = actix_test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn employee_role_is_forbidden_from_staff_routes() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;
        let req = actix_test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {}", token(Role::Employee))))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {}", token(Role::Hr))))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(actix_test::read_body(resp).await, "hr");
    }

    #[test]
    fn employees_are_scoped_to_themselves() {
        let own = Uuid::new_v4();
        let user = AuthUser { user_id: Uuid::new_v4(), role: Role::Employee, employee_id: Some(own) };
        assert_eq!(user.scope_to(None).unwrap(), Some(own));
        assert_eq!(user.scope_to(Some(own)).unwrap(), Some(own));
        assert!(matches!(user.scope_to(Some(Uuid::new_v4())), Err(AppError::Forbidden(_))));
        assert!(user.require_access_to(own).is_ok());
        assert!(user.require_access_to(Uuid::new_v4()).is_err());
        assert!(user.require_admin().is_err());
    }

    #[test]
    fn staff_see_everyone() {
        let other = Uuid::new_v4();
        let hr = AuthUser { user_id: Uuid::new_v4(), role: Role::Hr, employee_id: None };
        assert_eq!(hr.scope_to(None).unwrap(), None);
        assert_eq!(hr.scope_to(Some(other)).unwrap(), Some(other));
        assert!(hr.require_access_to(other).is_ok());
        assert!(hr.require_admin().is_err());

        let admin = AuthUser { role: Role::Admin, ..hr };
        assert!(admin.require_admin().is_ok());
    }

    #[test]
    fn roles_parse_from_storage_form() {
        assert_eq!(Role::parse("hr"), Some(Role::Hr));
        assert_eq!(Role::parse(Role::Admin.as_str()), Some(Role::Admin));
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn deactivated_accounts_are_refused() {
        let employee_id = Some(Uuid::new_v4());
        assert!(matches!(
            current_account(Some(("employee".to_string(), employee_id, Some(false)))),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(current_account(None), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn stored_role_replaces_token_role() {
        let employee_id = Some(Uuid::new_v4());
        assert_eq!(
            current_account(Some(("admin".to_string(), employee_id, Some(true)))).unwrap(),
            (Role::Admin, employee_id)
        );
        // staff logins without an employee record have nothing to deactivate
        assert_eq!(current_account(Some(("hr".to_string(), None, None))).unwrap(), (Role::Hr, None));
    }
}

use actix_web::{web, HttpResponse};
use log::warn;
use serde_json::json;
use sqlx::PgPool;

use crate::db;

pub async fn health(pool: web::Data<PgPool>) -> HttpResponse {
    match db::ping(&pool).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok", "database": "ok" })),
        Err(err) => {
            warn!("Health check failed to reach the database: {}", err);
            HttpResponse::ServiceUnavailable().json(json!({ "status": "degraded", "database": "unreachable" }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use sqlx::postgres::PgPoolOptions;

    #[actix_web::test]
    async fn reports_unreachable_database() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .route("/health", web::get().to(health)),
        )
        .await;

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod services;
mod utils;

use std::io;

use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};

use crate::config::Config;
use crate::errors::{json_error_handler, path_error_handler, query_error_handler};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health::health)))
        .service(web::resource("/auth").route(web::post().to(handlers::auth::auth_handler)))
        .service(
            web::resource("/user")
                .route(web::get().to(handlers::user::get_user_profile))
                .route(web::patch().to(handlers::user::update_user_account)),
        )
        .service(
            web::resource("/employee")
                .route(web::post().to(handlers::employee::create_employee))
                .route(web::get().to(handlers::employee::get_employees)),
        )
        .service(
            web::resource("/employee/{id}")
                .route(web::get().to(handlers::employee::get_employee))
                .route(web::patch().to(handlers::employee::update_employee))
                .route(web::delete().to(handlers::employee::deactivate_employee)),
        )
        .service(
            web::resource("/department")
                .route(web::post().to(handlers::department::create_department))
                .route(web::get().to(handlers::department::get_departments)),
        )
        .service(
            web::resource("/department/{id}")
                .route(web::patch().to(handlers::department::update_department))
                .route(web::delete().to(handlers::department::delete_department)),
        )
        .service(
            web::resource("/leave")
                .route(web::post().to(handlers::leave::request_leave))
                .route(web::get().to(handlers::leave::get_leaves)),
        )
        .service(web::resource("/leave/summary").route(web::get().to(handlers::leave::get_leave_summary)))
        .service(
            web::resource("/leave/{id}")
                .route(web::get().to(handlers::leave::get_leave))
                .route(web::delete().to(handlers::leave::cancel_leave)),
        )
        .service(
            web::resource("/leave/{id}/status").route(web::patch().to(handlers::leave::update_leave_status)),
        )
        .service(web::resource("/attendance").route(web::get().to(handlers::attendance::get_attendance)))
        .service(
            web::resource("/attendance/check-in").route(web::post().to(handlers::attendance::check_in)),
        )
        .service(
            web::resource("/attendance/check-out").route(web::post().to(handlers::attendance::check_out)),
        )
        .service(
            web::resource("/attendance/overview").route(web::get().to(handlers::attendance::get_overview)),
        )
        .service(
            web::resource("/attendance/missing-checkouts")
                .route(web::get().to(handlers::attendance::get_missing_checkouts)),
        )
        .service(
            web::resource("/attendance/summary")
                .route(web::get().to(handlers::attendance::get_attendance_summary)),
        )
        .service(
            web::resource("/regularization")
                .route(web::post().to(handlers::regularization::request_regularization))
                .route(web::get().to(handlers::regularization::get_regularizations)),
        )
        .service(
            web::resource("/regularization/{id}/review")
                .route(web::patch().to(handlers::regularization::review_regularization)),
        )
        .service(
            web::resource("/wfh")
                .route(web::post().to(handlers::wfh::request_wfh))
                .route(web::get().to(handlers::wfh::get_wfh_requests)),
        )
        .service(web::resource("/wfh/{id}/review").route(web::patch().to(handlers::wfh::review_wfh)))
        .service(
            web::resource("/task-report")
                .route(web::post().to(handlers::task_report::submit_task_report))
                .route(web::get().to(handlers::task_report::get_task_reports)),
        )
        .service(
            web::resource("/task-report/overview")
                .route(web::get().to(handlers::task_report::get_task_report_overview)),
        )
        .service(
            web::resource("/salary/structure/{employee_id}")
                .route(web::get().to(handlers::salary::get_structure))
                .route(web::put().to(handlers::salary::put_structure)),
        )
        .service(
            web::resource("/salary/slip")
                .route(web::post().to(handlers::salary::generate_slip))
                .route(web::get().to(handlers::salary::get_slips)),
        )
        .service(web::resource("/salary/slip/{id}").route(web::get().to(handlers::salary::get_slip)))
        .service(
            web::resource("/salary/tax-preview").route(web::post().to(handlers::salary::tax_preview)),
        )
        .service(
            web::resource("/document")
                .route(web::post().to(handlers::document::upload_document))
                .route(web::get().to(handlers::document::get_documents)),
        )
        .service(
            web::resource("/document/{id}").route(web::delete().to(handlers::document::delete_document)),
        )
        .service(
            web::resource("/help")
                .route(web::post().to(handlers::help::create_inquiry))
                .route(web::get().to(handlers::help::get_inquiries)),
        )
        .service(web::resource("/help/{id}").route(web::patch().to(handlers::help::update_inquiry)))
        .service(
            web::resource("/notification").route(web::get().to(handlers::notification::get_notifications)),
        )
        .service(
            web::resource("/notification/read-all")
                .route(web::patch().to(handlers::notification::mark_all_read)),
        )
        .service(
            web::resource("/notification/{id}/read").route(web::patch().to(handlers::notification::mark_read)),
        )
        .service(
            web::resource("/settings")
                .route(web::get().to(handlers::settings::get_settings))
                .route(web::patch().to(handlers::settings::update_settings)),
        );
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(|err| startup_error("Invalid configuration", err))?;

    let pool = db::create_pool(&config)
        .await
        .map_err(|err| startup_error("Failed to connect to the database", err))?;
    db::run_migrations(&pool)
        .await
        .map_err(|err| startup_error("Failed to run migrations", err))?;

    let s3_client = utils::s3::create_s3_client(config.aws_region.clone()).await;

    let bind_address = config.bind_address.clone();
    let pool = web::Data::new(pool);
    let config = web::Data::new(config);
    let s3_client = web::Data::new(s3_client);

    info!("Starting server at {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(s3_client.clone())
            .app_data(web::JsonConfig::default().limit(64 * 1024).error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .service(web::scope("/v1").configure(routes))
    })
    .bind(bind_address)?
    .run()
    .await
}

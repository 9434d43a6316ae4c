//! Route configuration
//!
//! Centralized route setup; handlers stay thin and domain logic lives in
//! the services.

use actix_web::{web, HttpResponse};

use crate::handlers::{admin, earnings, health};

/// Configure all routes for the application
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Operational endpoints
        .route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health::health_check))
        .route("/health/ready", web::get().to(health::readiness_check))
        .route("/health/live", web::get().to(health::liveness_check))
        // API routes
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/earnings")
                        .route("/sessions", web::post().to(earnings::report_watch_session))
                        .route("/events", web::post().to(earnings::report_engagement))
                        .route(
                            "/{creator_id}/realtime",
                            web::get().to(earnings::get_realtime_earnings),
                        )
                        .route(
                            "/{creator_id}/weekly",
                            web::get().to(earnings::get_weekly_history),
                        )
                        .route(
                            "/{creator_id}/ledger",
                            web::get().to(earnings::list_ledger_entries),
                        ),
                )
                .service(
                    web::scope("/admin/earnings")
                        .route(
                            "/weekly-run",
                            web::post().to(admin::run_weekly_aggregation),
                        )
                        .route(
                            "/reconcile/{creator_id}",
                            web::post().to(admin::reconcile_creator),
                        )
                        .route("/rates", web::get().to(admin::get_rates))
                        .route("/rates", web::put().to(admin::update_rates)),
                ),
        );
}

/// Metrics handler
async fn metrics_handler() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(crate::metrics::gather_metrics())
}

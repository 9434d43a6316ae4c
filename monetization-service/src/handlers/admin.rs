/// Administrative earnings operations
///
/// Weekly aggregation trigger, balance reconciliation, and rate
/// configuration. Callers are the platform's admin surface; errors carry
/// machine-readable codes via AppError.
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::services::rates::RateUpdate;
use crate::services::{RateService, ReconciliationService, WeeklyAggregator};

#[derive(Debug, Default, Deserialize)]
pub struct WeeklyRunRequest {
    /// Any instant inside the target week; defaults to now
    pub reference_date: Option<DateTime<Utc>>,
}

/// Run the weekly earnings aggregation
/// POST /api/v1/admin/earnings/weekly-run
pub async fn run_weekly_aggregation(
    pool: web::Data<PgPool>,
    rates: web::Data<RateService>,
    body: web::Json<WeeklyRunRequest>,
) -> Result<HttpResponse> {
    let reference = body.reference_date.unwrap_or_else(Utc::now);

    info!(reference = %reference, "Weekly aggregation requested");

    let aggregator = WeeklyAggregator::new(pool.get_ref().clone(), rates.into_inner());
    let outcome = aggregator.calculate_weekly_earnings(reference).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Recompute one creator's balances from the ledger
/// POST /api/v1/admin/earnings/reconcile/{creator_id}
pub async fn reconcile_creator(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let creator_id = path.into_inner();

    info!(creator_id = %creator_id, "Balance reconciliation requested");

    let service = ReconciliationService::new(pool.get_ref().clone());
    let report = service.reconcile(creator_id).await?;

    Ok(HttpResponse::Ok().json(report))
}

/// Current earning rate schedule
/// GET /api/v1/admin/earnings/rates
pub async fn get_rates(rates: web::Data<RateService>) -> Result<HttpResponse> {
    let schedule = rates.current().await;
    Ok(HttpResponse::Ok().json(schedule.as_ref()))
}

/// Replace the earning rate schedule (appends a new version)
/// PUT /api/v1/admin/earnings/rates
pub async fn update_rates(
    rates: web::Data<RateService>,
    body: web::Json<RateUpdate>,
) -> Result<HttpResponse> {
    let schedule = rates.update(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(schedule.as_ref()))
}

/// Earnings API handlers
///
/// Telemetry/social ingest endpoints (called by the platform's reporting
/// handlers) and creator-facing dashboard reads.
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::db::{ledger_repo, telemetry_repo};
use crate::error::{AppError, Result};
use crate::models::{AccrualOutcome, EarningKind, LedgerEntry};
use crate::services::{AccrualService, EarningsStatsService, RateService};

/// Watch-session heartbeat report
#[derive(Debug, Deserialize)]
pub struct SessionReportRequest {
    pub session_id: String,
    pub video_id: Uuid,
    pub creator_id: Uuid,
    pub watch_duration_seconds: i32,
    pub watch_percentage: Option<f32>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Social event report
#[derive(Debug, Deserialize)]
pub struct EngagementReportRequest {
    pub video_id: Uuid,
    pub creator_id: Uuid,
    /// "like", "comment" or "share"
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct AccrualResponse {
    pub accrued: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<LedgerEntry>,
}

impl From<AccrualOutcome> for AccrualResponse {
    fn from(outcome: AccrualOutcome) -> Self {
        let outcome_str = outcome.as_str();
        match outcome {
            AccrualOutcome::Created(entry) | AccrualOutcome::Updated(entry) => Self {
                accrued: true,
                outcome: outcome_str,
                reason: None,
                entry: Some(entry),
            },
            AccrualOutcome::Skipped(reason) => Self {
                accrued: false,
                outcome: outcome_str,
                reason: Some(reason.as_str()),
                entry: None,
            },
        }
    }
}

/// Report a watch-session heartbeat and accrue view earnings
/// POST /api/v1/earnings/sessions
pub async fn report_watch_session(
    pool: web::Data<PgPool>,
    rates: web::Data<RateService>,
    body: web::Json<SessionReportRequest>,
) -> Result<HttpResponse> {
    let req = body.into_inner();

    if req.session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id must not be empty".to_string()));
    }
    if req.watch_duration_seconds < 0 {
        return Err(AppError::Validation(
            "watch_duration_seconds must not be negative".to_string(),
        ));
    }

    debug!(
        session_id = %req.session_id,
        video_id = %req.video_id,
        duration = req.watch_duration_seconds,
        "Watch-session heartbeat received"
    );

    // Record telemetry first; the stored duration is the monotonic maximum
    // and is what actually accrues, so a stale heartbeat cannot shrink an
    // already-priced session.
    let session = telemetry_repo::upsert_watch_session(
        &pool,
        &req.session_id,
        req.video_id,
        req.creator_id,
        req.watch_duration_seconds,
        req.watch_percentage,
        req.started_at,
    )
    .await?;

    let accrual = AccrualService::new(pool.get_ref().clone(), rates.into_inner());
    let outcome = accrual
        .accrue_view(
            req.video_id,
            req.creator_id,
            i64::from(session.watch_duration_seconds),
            &req.session_id,
        )
        .await?;

    Ok(HttpResponse::Ok().json(AccrualResponse::from(outcome)))
}

/// Report a like/comment/share and accrue the flat bonus
/// POST /api/v1/earnings/events
pub async fn report_engagement(
    pool: web::Data<PgPool>,
    rates: web::Data<RateService>,
    body: web::Json<EngagementReportRequest>,
) -> Result<HttpResponse> {
    let req = body.into_inner();

    let kind: EarningKind = req
        .kind
        .parse()
        .map_err(|e: String| AppError::Validation(e))?;
    if !kind.is_engagement() {
        return Err(AppError::Validation(
            "kind must be one of: like, comment, share".to_string(),
        ));
    }

    debug!(
        video_id = %req.video_id,
        creator_id = %req.creator_id,
        kind = kind.as_str(),
        "Social event received"
    );

    telemetry_repo::insert_social_event(&pool, req.video_id, req.creator_id, kind).await?;

    let accrual = AccrualService::new(pool.get_ref().clone(), rates.into_inner());
    let outcome = accrual
        .accrue_engagement(req.video_id, req.creator_id, kind)
        .await?;

    Ok(HttpResponse::Ok().json(AccrualResponse::from(outcome)))
}

/// Real-time earnings rollup for a creator dashboard
/// GET /api/v1/earnings/{creator_id}/realtime
pub async fn get_realtime_earnings(
    pool: web::Data<PgPool>,
    redis: Option<web::Data<redis::aio::ConnectionManager>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let creator_id = path.into_inner();

    let service =
        EarningsStatsService::new(pool.get_ref().clone(), redis.map(|r| r.get_ref().clone()));
    let stats = service.realtime_earnings(creator_id).await?;

    Ok(HttpResponse::Ok().json(stats))
}

#[derive(Debug, Deserialize)]
pub struct WeeklyHistoryQuery {
    #[serde(default = "default_weeks_back")]
    pub weeks_back: i64,
}

fn default_weeks_back() -> i64 {
    12
}

/// Weekly earnings history for a creator dashboard
/// GET /api/v1/earnings/{creator_id}/weekly?weeks_back=12
pub async fn get_weekly_history(
    pool: web::Data<PgPool>,
    redis: Option<web::Data<redis::aio::ConnectionManager>>,
    path: web::Path<Uuid>,
    query: web::Query<WeeklyHistoryQuery>,
) -> Result<HttpResponse> {
    let creator_id = path.into_inner();

    let service =
        EarningsStatsService::new(pool.get_ref().clone(), redis.map(|r| r.get_ref().clone()));
    let snapshots = service
        .weekly_history(creator_id, query.weeks_back)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "creator_id": creator_id,
        "count": snapshots.len(),
        "snapshots": snapshots,
    })))
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub status: Option<String>,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct LedgerListResponse {
    pub entries: Vec<LedgerEntry>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Paginated ledger listing for a creator
/// GET /api/v1/earnings/{creator_id}/ledger?limit=50&offset=0&status=pending
pub async fn list_ledger_entries(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse> {
    let creator_id = path.into_inner();

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);
    let status = match query.status.as_deref() {
        Some(s) => Some(s.parse().map_err(|e: String| AppError::Validation(e))?),
        None => None,
    };

    let (entries, total_count) = tokio::try_join!(
        ledger_repo::list_entries(&pool, creator_id, status, limit, offset),
        ledger_repo::count_entries(&pool, creator_id, status),
    )?;

    Ok(HttpResponse::Ok().json(LedgerListResponse {
        entries,
        total_count,
        limit,
        offset,
    }))
}

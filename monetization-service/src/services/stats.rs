//! Read-side earnings rollups for creator dashboards.
//!
//! Money windows come from the ledger; raw view/engagement counts come
//! straight from the telemetry and social-event sources so this view and
//! the analytics dashboards never disagree on counts. Responses are cached
//! in Redis for a short TTL with a PostgreSQL fallback on any cache
//! failure: dashboard reads degrade, they do not error.

use chrono::{DateTime, Duration, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db::{creator_repo, ledger_repo, snapshot_repo, telemetry_repo};
use crate::error::{AppError, Result};
use crate::models::WeeklyEarningsSnapshot;
use crate::services::weekly::week_bounds;

const CACHE_TTL_SECS: u64 = 30;

/// Week-over-week percentage change, one decimal. Zero when there is no
/// prior-week baseline.
pub fn trend_pct(current: Decimal, last: Decimal) -> Decimal {
    if last > Decimal::ZERO {
        ((current - last) / last * Decimal::from(100))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    } else {
        Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStats {
    pub week_start: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub earnings: Decimal,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEarnings {
    pub creator_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_earnings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pending_earnings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub paid_earnings: Decimal,
    pub current_week: WindowStats,
    pub last_week: WindowStats,
    #[serde(with = "rust_decimal::serde::float")]
    pub trend_pct: Decimal,
}

#[derive(Clone)]
pub struct EarningsStatsService {
    pool: PgPool,
    redis: Option<ConnectionManager>,
}

impl EarningsStatsService {
    pub fn new(pool: PgPool, redis: Option<ConnectionManager>) -> Self {
        Self { pool, redis }
    }

    pub async fn realtime_earnings(&self, creator_id: Uuid) -> Result<RealtimeEarnings> {
        let cache_key = format!("earnings:{}:realtime", creator_id);

        if let Some(cached) = self.cache_get(&cache_key).await {
            return Ok(cached);
        }

        let account = creator_repo::find_account(&self.pool, creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("creator account {}", creator_id)))?;

        let now = Utc::now();
        let (current_start, current_end) = week_bounds(now.date_naive());
        let (last_start, last_end) = week_bounds((now - Duration::days(7)).date_naive());

        let current_week = self
            .window_stats(creator_id, current_start, current_end)
            .await?;
        let last_week = self.window_stats(creator_id, last_start, last_end).await?;

        let stats = RealtimeEarnings {
            creator_id,
            total_earnings: account.total_earnings,
            pending_earnings: account.pending_earnings,
            paid_earnings: account.paid_earnings,
            trend_pct: trend_pct(current_week.earnings, last_week.earnings),
            current_week,
            last_week,
        };

        self.cache_put(&cache_key, &stats).await;

        Ok(stats)
    }

    pub async fn weekly_history(
        &self,
        creator_id: Uuid,
        weeks_back: i64,
    ) -> Result<Vec<WeeklyEarningsSnapshot>> {
        let weeks_back = weeks_back.clamp(1, 52);
        snapshot_repo::history(&self.pool, creator_id, weeks_back).await
    }

    async fn window_stats(
        &self,
        creator_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<WindowStats> {
        let earnings = ledger_repo::earnings_between(&self.pool, creator_id, from, to).await?;

        // Raw counts degrade to zero rather than failing the dashboard read
        let views = match telemetry_repo::session_count_between(&self.pool, creator_id, from, to)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(creator_id = %creator_id, error = %e, "Failed to count watch sessions");
                0
            }
        };

        let engagement =
            match telemetry_repo::engagement_counts_between(&self.pool, creator_id, from, to).await
            {
                Ok(counts) => counts,
                Err(e) => {
                    warn!(creator_id = %creator_id, error = %e, "Failed to count social events");
                    Default::default()
                }
            };

        Ok(WindowStats {
            week_start: from,
            earnings,
            views,
            likes: engagement.likes,
            comments: engagement.comments,
            shares: engagement.shares,
        })
    }

    async fn cache_get(&self, key: &str) -> Option<RealtimeEarnings> {
        let redis = self.redis.as_ref()?;

        let cached: Option<String> = match redis.clone().get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Stats cache read failed, falling back to PostgreSQL");
                return None;
            }
        };

        cached.and_then(|json| serde_json::from_str(&json).ok())
    }

    async fn cache_put(&self, key: &str, stats: &RealtimeEarnings) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };

        let json = match serde_json::to_string(stats) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize stats for cache");
                return;
            }
        };

        if let Err(e) = redis
            .clone()
            .set_ex::<_, _, ()>(key, json, CACHE_TTL_SECS)
            .await
        {
            warn!(error = %e, "Stats cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_trend_positive() {
        assert_eq!(trend_pct(dec("150"), dec("100")), dec("50.0"));
    }

    #[test]
    fn test_trend_negative_rounds_to_one_decimal() {
        assert_eq!(trend_pct(dec("1"), dec("3")), dec("-66.7"));
    }

    #[test]
    fn test_trend_zero_baseline() {
        assert_eq!(trend_pct(dec("100"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(trend_pct(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_trend_flat_week() {
        assert_eq!(trend_pct(dec("42"), dec("42")), dec("0.0"));
    }
}

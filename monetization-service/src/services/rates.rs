use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::RateSchedule;

/// Requested replacement rate configuration. Applied as a new append-only
/// version after bounds checks.
#[derive(Debug, Clone, Deserialize)]
pub struct RateUpdate {
    #[serde(with = "rust_decimal::serde::float")]
    pub per_view: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub per_watch_minute: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub engagement_bonus_pct: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_retention_for_bonus: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub per_like: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub per_comment: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub per_share: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_payout: Decimal,
}

impl RateUpdate {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let hundred = Decimal::from(100);
        let rate_fields = [
            ("per_view", self.per_view),
            ("per_watch_minute", self.per_watch_minute),
            ("per_like", self.per_like),
            ("per_comment", self.per_comment),
            ("per_share", self.per_share),
        ];
        for (name, value) in rate_fields {
            if value < Decimal::ZERO || value > hundred {
                return Err(format!("{} must be between 0 and 100", name));
            }
        }

        let fraction_fields = [
            ("engagement_bonus_pct", self.engagement_bonus_pct),
            ("min_retention_for_bonus", self.min_retention_for_bonus),
        ];
        for (name, value) in fraction_fields {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(format!("{} must be between 0 and 1", name));
            }
        }

        if self.min_payout < Decimal::ZERO || self.min_payout > Decimal::from(10_000) {
            return Err("min_payout must be between 0 and 10000".to_string());
        }

        Ok(())
    }
}

/// Process-wide earning rate configuration.
///
/// Rates are append-only versioned rows; the cached current version is read
/// once per accrual so a mid-flight rate change never splits one accrual's
/// math. Eventual consistency across instances is acceptable.
pub struct RateService {
    pool: PgPool,
    current: RwLock<Arc<RateSchedule>>,
}

impl RateService {
    /// Load the highest rate version. The schema seeds version 1, so an
    /// empty table means a broken deployment.
    pub async fn load(pool: PgPool) -> Result<Self> {
        let schedule = fetch_latest(&pool).await?.ok_or_else(|| {
            AppError::Internal("no earning rates configured; seed migration missing".to_string())
        })?;

        info!(version = schedule.version, "Loaded earning rate schedule");

        Ok(Self {
            pool,
            current: RwLock::new(Arc::new(schedule)),
        })
    }

    /// Snapshot of the current schedule. Callers hold the Arc for the whole
    /// accrual so the version they price with is the version they record.
    pub async fn current(&self) -> Arc<RateSchedule> {
        self.current.read().await.clone()
    }

    /// Append a new rate version and make it current
    pub async fn update(&self, update: RateUpdate) -> Result<Arc<RateSchedule>> {
        update.validate().map_err(AppError::Validation)?;

        let schedule = sqlx::query_as::<_, RateSchedule>(
            r#"
            INSERT INTO earning_rates
                (per_view, per_watch_minute, engagement_bonus_pct, min_retention_for_bonus,
                 per_like, per_comment, per_share, min_payout)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING version, per_view, per_watch_minute, engagement_bonus_pct,
                      min_retention_for_bonus, per_like, per_comment, per_share,
                      min_payout, created_at
            "#,
        )
        .bind(update.per_view)
        .bind(update.per_watch_minute)
        .bind(update.engagement_bonus_pct)
        .bind(update.min_retention_for_bonus)
        .bind(update.per_like)
        .bind(update.per_comment)
        .bind(update.per_share)
        .bind(update.min_payout)
        .fetch_one(&self.pool)
        .await?;

        let schedule = Arc::new(schedule);
        *self.current.write().await = schedule.clone();

        info!(version = schedule.version, "Earning rate schedule updated");

        Ok(schedule)
    }
}

async fn fetch_latest(pool: &PgPool) -> Result<Option<RateSchedule>> {
    let schedule = sqlx::query_as::<_, RateSchedule>(
        r#"
        SELECT version, per_view, per_watch_minute, engagement_bonus_pct,
               min_retention_for_bonus, per_like, per_comment, per_share,
               min_payout, created_at
        FROM earning_rates
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn valid_update() -> RateUpdate {
        RateUpdate {
            per_view: Decimal::from_str("0.5").unwrap(),
            per_watch_minute: Decimal::ONE,
            engagement_bonus_pct: Decimal::from_str("0.1").unwrap(),
            min_retention_for_bonus: Decimal::from_str("0.5").unwrap(),
            per_like: Decimal::from_str("0.05").unwrap(),
            per_comment: Decimal::from_str("0.1").unwrap(),
            per_share: Decimal::from_str("0.15").unwrap(),
            min_payout: Decimal::from(50),
        }
    }

    #[test]
    fn test_valid_update_passes() {
        assert!(valid_update().validate().is_ok());
    }

    #[test]
    fn test_per_view_out_of_bounds() {
        let mut update = valid_update();
        update.per_view = Decimal::from(101);
        assert!(update.validate().is_err());

        update.per_view = Decimal::from(-1);
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_bonus_pct_out_of_bounds() {
        let mut update = valid_update();
        update.engagement_bonus_pct = Decimal::from_str("1.5").unwrap();
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_retention_threshold_bounds() {
        let mut update = valid_update();
        update.min_retention_for_bonus = Decimal::ONE;
        assert!(update.validate().is_ok());

        update.min_retention_for_bonus = Decimal::from_str("1.01").unwrap();
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_min_payout_bounds() {
        let mut update = valid_update();
        update.min_payout = Decimal::from(10_000);
        assert!(update.validate().is_ok());

        update.min_payout = Decimal::from(10_001);
        assert!(update.validate().is_err());
    }
}

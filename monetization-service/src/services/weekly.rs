//! Weekly earnings aggregation.
//!
//! Batch job, invoked on demand from the admin surface. Computes each
//! verified creator's earnings for one ISO week from the cumulative video
//! counters and freezes the result as a snapshot. Runs at most once per
//! week key.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::ledger_repo::NewLedgerEntry;
use crate::db::snapshot_repo::NewSnapshot;
use crate::db::{creator_repo, ledger_repo, snapshot_repo, telemetry_repo};
use crate::error::Result;
use crate::metrics::{WEEKLY_CREATORS_SKIPPED, WEEKLY_RUNS_TOTAL};
use crate::models::{EarningKind, RateSchedule};
use crate::services::accrual::round_currency;

/// ISO-week key, e.g. "2026-W31"
pub fn week_key(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

/// Monday 00:00:00 through Sunday 23:59:59 (UTC) of the week containing `date`
pub fn week_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let start = monday.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(7) - Duration::seconds(1);
    (start, end)
}

/// Ledger description tag the idempotency guard searches for
fn week_tag(week_number: &str) -> String {
    format!("({})", week_number)
}

#[derive(Debug, Serialize)]
pub struct CreatorWeeklyResult {
    pub creator_id: Uuid,
    pub total_views: i64,
    pub total_watch_minutes: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_earnings: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SkippedCreator {
    pub creator_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct WeeklyRunReport {
    pub week_number: String,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub processed: Vec<CreatorWeeklyResult>,
    pub skipped: Vec<SkippedCreator>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeeklyRunOutcome {
    /// A prior run already wrote this week; nothing was touched
    AlreadyCalculated { week_number: String },
    Completed(WeeklyRunReport),
}

pub struct WeeklyAggregator {
    pool: PgPool,
    rates: Arc<super::RateService>,
}

impl WeeklyAggregator {
    pub fn new(pool: PgPool, rates: Arc<super::RateService>) -> Self {
        Self { pool, rates }
    }

    /// Aggregate the week containing `reference`.
    ///
    /// Partial-failure tolerant: one creator's failure is logged and
    /// reported, the batch continues for the rest.
    pub async fn calculate_weekly_earnings(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<WeeklyRunOutcome> {
        let reference_date = reference.date_naive();
        let week_number = week_key(reference_date);
        let (week_start, week_end) = week_bounds(reference_date);

        if ledger_repo::week_tag_exists(&self.pool, &week_tag(&week_number)).await? {
            info!(week = %week_number, "Weekly earnings already calculated, aborting");
            WEEKLY_RUNS_TOTAL
                .with_label_values(&["already_calculated"])
                .inc();
            return Ok(WeeklyRunOutcome::AlreadyCalculated { week_number });
        }

        // One rate snapshot for the whole batch; a mid-run rate change does
        // not split the week across versions.
        let rates = self.rates.current().await;
        let creators = creator_repo::list_verified_creator_ids(&self.pool).await?;

        info!(
            week = %week_number,
            creators = creators.len(),
            "Starting weekly earnings aggregation"
        );

        let mut processed = Vec::new();
        let mut skipped = Vec::new();

        for creator_id in creators {
            match self
                .aggregate_creator(creator_id, &week_number, week_start, week_end, &rates)
                .await
            {
                Ok(Some(result)) => processed.push(result),
                Ok(None) => {}
                Err(e) => {
                    error!(
                        creator_id = %creator_id,
                        week = %week_number,
                        error = %e,
                        "Weekly aggregation failed for creator, skipping"
                    );
                    WEEKLY_CREATORS_SKIPPED.inc();
                    skipped.push(SkippedCreator {
                        creator_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            week = %week_number,
            processed = processed.len(),
            skipped = skipped.len(),
            "Weekly earnings aggregation completed"
        );
        WEEKLY_RUNS_TOTAL.with_label_values(&["completed"]).inc();

        Ok(WeeklyRunOutcome::Completed(WeeklyRunReport {
            week_number,
            week_start,
            week_end,
            processed,
            skipped,
        }))
    }

    async fn aggregate_creator(
        &self,
        creator_id: Uuid,
        week_number: &str,
        week_start: DateTime<Utc>,
        week_end: DateTime<Utc>,
        rates: &RateSchedule,
    ) -> Result<Option<CreatorWeeklyResult>> {
        let stats = telemetry_repo::video_stats_for_creator(&self.pool, creator_id).await?;

        let total_views: i64 = stats.iter().map(|s| s.view_count).sum();
        let total_watch_minutes: i64 = stats.iter().map(|s| s.total_watch_minutes).sum();

        let view_earnings = round_currency(Decimal::from(total_views) * rates.per_view);
        let watch_earnings =
            round_currency(Decimal::from(total_watch_minutes) * rates.per_watch_minute);
        let total_earnings = view_earnings + watch_earnings;

        if total_earnings <= Decimal::ZERO {
            return Ok(None);
        }

        let tag = week_tag(week_number);
        let mut tx = self.pool.begin().await?;

        let snapshot = snapshot_repo::insert_snapshot(
            &mut *tx,
            &NewSnapshot {
                creator_id,
                week_number: week_number.to_string(),
                week_start,
                week_end,
                total_views,
                total_watch_minutes,
                total_earnings,
            },
        )
        .await?;

        if snapshot.is_none() {
            // A concurrent run slipped past the description guard; the
            // unique snapshot constraint is the backstop.
            warn!(
                creator_id = %creator_id,
                week = %week_number,
                "Weekly snapshot already exists, skipping creator"
            );
            tx.rollback().await?;
            return Ok(None);
        }

        ledger_repo::insert_entry(
            &mut *tx,
            &NewLedgerEntry {
                creator_id,
                video_id: None,
                session_id: None,
                kind: EarningKind::View,
                amount: view_earnings,
                description: format!("Weekly view earnings {}", tag),
                rate_version: rates.version,
            },
        )
        .await?;

        ledger_repo::insert_entry(
            &mut *tx,
            &NewLedgerEntry {
                creator_id,
                video_id: None,
                session_id: None,
                kind: EarningKind::View,
                amount: watch_earnings,
                description: format!("Weekly watch-time earnings {}", tag),
                rate_version: rates.version,
            },
        )
        .await?;

        creator_repo::apply_earning_delta(&mut *tx, creator_id, total_earnings).await?;

        tx.commit().await?;

        Ok(Some(CreatorWeeklyResult {
            creator_id,
            total_views,
            total_watch_minutes,
            total_earnings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_key_mid_year() {
        assert_eq!(week_key(date(2026, 8, 4)), "2026-W32");
    }

    #[test]
    fn test_week_key_pads_single_digit_weeks() {
        assert_eq!(week_key(date(2026, 1, 7)), "2026-W02");
    }

    #[test]
    fn test_week_key_year_rollover() {
        // Dec 29 2025 is the Monday of the week containing Jan 1 2026,
        // so it belongs to ISO year 2026
        assert_eq!(week_key(date(2025, 12, 29)), "2026-W01");
        assert_eq!(week_key(date(2026, 1, 1)), "2026-W01");
    }

    #[test]
    fn test_week_bounds_monday_through_sunday() {
        // Aug 4 2026 is a Tuesday; its week runs Aug 3 through Aug 9
        let (start, end) = week_bounds(date(2026, 8, 4));
        assert_eq!(start.to_rfc3339(), "2026-08-03T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-08-09T23:59:59+00:00");
    }

    #[test]
    fn test_week_bounds_on_monday_and_sunday() {
        let (start, end) = week_bounds(date(2026, 8, 3));
        assert_eq!(start.to_rfc3339(), "2026-08-03T00:00:00+00:00");

        let (start_sun, end_sun) = week_bounds(date(2026, 8, 9));
        assert_eq!(start_sun, start);
        assert_eq!(end_sun, end);
    }

    #[test]
    fn test_week_bounds_cross_year() {
        let (start, end) = week_bounds(date(2026, 1, 1));
        assert_eq!(start.to_rfc3339(), "2025-12-29T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-01-04T23:59:59+00:00");
    }

    #[test]
    fn test_week_tag_format() {
        assert_eq!(week_tag("2026-W32"), "(2026-W32)");
    }
}

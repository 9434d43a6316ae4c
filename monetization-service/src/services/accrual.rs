//! Session and engagement accrual engines.
//!
//! Converts a watch-session telemetry record or a social event into exactly
//! one ledger mutation plus one marginal balance adjustment, inside a single
//! transaction. View accruals deduplicate per (creator, video, session);
//! engagement accruals are one-shot.

use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::db::{creator_repo, ledger_repo, telemetry_repo};
use crate::db::ledger_repo::NewLedgerEntry;
use crate::error::{AppError, Result};
use crate::metrics::ACCRUALS_TOTAL;
use crate::models::{AccrualOutcome, EarningKind, RateSchedule, SkipReason};

/// Round a monetary amount to 2 decimals, half-up
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Price one watch session.
///
/// `per_view` plus one `per_watch_minute` per full minute watched; the
/// retention bonus multiplies the whole amount when the watched fraction of
/// the video reaches the configured threshold. A video with no known
/// duration has zero retention and cannot earn the bonus.
pub fn view_amount(rates: &RateSchedule, watch_seconds: i64, video_duration_seconds: i64) -> Decimal {
    let watch_minutes = Decimal::from(watch_seconds / 60);
    let mut amount = rates.per_view + watch_minutes * rates.per_watch_minute;

    let retention = if video_duration_seconds > 0 {
        (Decimal::from(watch_seconds) / Decimal::from(video_duration_seconds)).min(Decimal::ONE)
    } else {
        Decimal::ZERO
    };

    if retention >= rates.min_retention_for_bonus {
        amount *= Decimal::ONE + rates.engagement_bonus_pct;
    }

    round_currency(amount)
}

/// Accrual engine over the ledger store and creator balances
#[derive(Clone)]
pub struct AccrualService {
    pool: PgPool,
    rates: Arc<super::RateService>,
}

impl AccrualService {
    pub fn new(pool: PgPool, rates: Arc<super::RateService>) -> Self {
        Self { pool, rates }
    }

    /// Accrue earnings for one watch session.
    ///
    /// The first report for a session inserts a ledger entry and credits the
    /// full amount; later reports re-price the same entry and move the
    /// balance by the difference only. Ledger write and balance adjustment
    /// commit together or not at all, so a retried call recomputes instead
    /// of double-counting.
    pub async fn accrue_view(
        &self,
        video_id: Uuid,
        creator_id: Uuid,
        watch_seconds: i64,
        session_id: &str,
    ) -> Result<AccrualOutcome> {
        let account = creator_repo::find_account(&self.pool, creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("creator account {}", creator_id)))?;

        if !account.verified {
            return Ok(self.skip(EarningKind::View, SkipReason::CreatorNotVerified));
        }

        // Only concrete telemetry durations accrue; nothing is estimated.
        if watch_seconds <= 0 {
            return Ok(self.skip(EarningKind::View, SkipReason::NoWatchDuration));
        }

        let rates = self.rates.current().await;
        let video_duration = telemetry_repo::video_duration_seconds(&self.pool, video_id)
            .await?
            .unwrap_or(0);
        let amount = view_amount(&rates, watch_seconds, i64::from(video_duration));

        let mut tx = self.pool.begin().await?;

        let existing =
            ledger_repo::find_view_entry_for_update(&mut *tx, creator_id, video_id, session_id)
                .await?;

        let outcome = match existing {
            Some(previous) => {
                self.reprice_entry(&mut *tx, previous.id, previous.amount, amount, rates.version)
                    .await?
            }
            None => {
                let new = NewLedgerEntry {
                    creator_id,
                    video_id: Some(video_id),
                    session_id: Some(session_id.to_string()),
                    kind: EarningKind::View,
                    amount,
                    description: format!(
                        "View earnings for video {} (session {})",
                        video_id, session_id
                    ),
                    rate_version: rates.version,
                };

                match ledger_repo::insert_view_entry(&mut *tx, &new).await? {
                    Some(entry) => {
                        creator_repo::apply_earning_delta(&mut *tx, creator_id, amount).await?;
                        AccrualOutcome::Created(entry)
                    }
                    None => {
                        // Lost the insert race; the row exists now, so lock
                        // it and take the re-price path.
                        let previous = ledger_repo::find_view_entry_for_update(
                            &mut *tx, creator_id, video_id, session_id,
                        )
                        .await?
                        .ok_or_else(|| {
                            AppError::Internal(format!(
                                "view entry for session {} vanished mid-transaction",
                                session_id
                            ))
                        })?;

                        self.reprice_entry(
                            &mut *tx,
                            previous.id,
                            previous.amount,
                            amount,
                            rates.version,
                        )
                        .await?
                    }
                }
            }
        };

        tx.commit().await?;

        ACCRUALS_TOTAL
            .with_label_values(&["view", outcome.as_str()])
            .inc();

        Ok(outcome)
    }

    /// Accrue a flat bonus for a like/comment/share.
    ///
    /// Every social event is an independent economic event: no dedup, no
    /// retraction on unlike.
    pub async fn accrue_engagement(
        &self,
        video_id: Uuid,
        creator_id: Uuid,
        kind: EarningKind,
    ) -> Result<AccrualOutcome> {
        if !kind.is_engagement() {
            return Err(AppError::Validation(format!(
                "kind {} is not an engagement kind",
                kind
            )));
        }

        let account = creator_repo::find_account(&self.pool, creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("creator account {}", creator_id)))?;

        if !account.verified {
            return Ok(self.skip(kind, SkipReason::CreatorNotVerified));
        }

        let rates = self.rates.current().await;
        let amount = rates.engagement_rate(kind);
        if amount <= Decimal::ZERO {
            return Ok(self.skip(kind, SkipReason::ZeroRate));
        }
        let amount = round_currency(amount);

        let mut tx = self.pool.begin().await?;

        let entry = ledger_repo::insert_entry(
            &mut *tx,
            &NewLedgerEntry {
                creator_id,
                video_id: Some(video_id),
                session_id: None,
                kind,
                amount,
                description: format!("Engagement bonus ({}) for video {}", kind, video_id),
                rate_version: rates.version,
            },
        )
        .await?;

        creator_repo::apply_earning_delta(&mut *tx, creator_id, amount).await?;

        tx.commit().await?;

        ACCRUALS_TOTAL
            .with_label_values(&[kind.as_str(), "created"])
            .inc();

        Ok(AccrualOutcome::Created(entry))
    }

    async fn reprice_entry(
        &self,
        conn: &mut sqlx::PgConnection,
        entry_id: Uuid,
        old_amount: Decimal,
        new_amount: Decimal,
        rate_version: i32,
    ) -> Result<AccrualOutcome> {
        let entry = ledger_repo::update_amount(conn, entry_id, new_amount, rate_version).await?;

        // Balance moves by the difference, never the full new amount
        let delta = new_amount - old_amount;
        if delta != Decimal::ZERO {
            creator_repo::apply_earning_delta(conn, entry.creator_id, delta).await?;
        }

        Ok(AccrualOutcome::Updated(entry))
    }

    fn skip(&self, kind: EarningKind, reason: SkipReason) -> AccrualOutcome {
        debug!(kind = kind.as_str(), reason = reason.as_str(), "Accrual skipped");
        ACCRUALS_TOTAL
            .with_label_values(&[kind.as_str(), "skipped"])
            .inc();
        AccrualOutcome::Skipped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn rates(
        per_view: &str,
        per_watch_minute: &str,
        bonus_pct: &str,
        min_retention: &str,
    ) -> RateSchedule {
        RateSchedule {
            version: 1,
            per_view: Decimal::from_str(per_view).unwrap(),
            per_watch_minute: Decimal::from_str(per_watch_minute).unwrap(),
            engagement_bonus_pct: Decimal::from_str(bonus_pct).unwrap(),
            min_retention_for_bonus: Decimal::from_str(min_retention).unwrap(),
            per_like: Decimal::from_str("0.05").unwrap(),
            per_comment: Decimal::from_str("0.10").unwrap(),
            per_share: Decimal::from_str("0.15").unwrap(),
            min_payout: Decimal::from(50),
            created_at: Utc::now(),
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_view_amount_with_retention_bonus() {
        // 600s video watched 360s: 6 minutes, 60% retention, bonus applies
        let r = rates("0.5", "1", "0.1", "0.5");
        assert_eq!(view_amount(&r, 360, 600), dec("7.15"));
    }

    #[test]
    fn test_view_amount_longer_heartbeat() {
        // Same session revisited at 420s: 7 minutes, 70% retention
        let r = rates("0.5", "1", "0.1", "0.5");
        assert_eq!(view_amount(&r, 420, 600), dec("8.25"));
    }

    #[test]
    fn test_reprice_delta_is_marginal() {
        let r = rates("0.5", "1", "0.1", "0.5");
        let first = view_amount(&r, 360, 600);
        let second = view_amount(&r, 420, 600);
        assert_eq!(second - first, dec("1.10"));
    }

    #[test]
    fn test_bonus_threshold_boundary() {
        let r = rates("0.5", "1", "0.1", "0.5");
        // 499/1000 = 0.499 retention: no bonus (8 minutes watched)
        assert_eq!(view_amount(&r, 499, 1000), dec("8.50"));
        // 500/1000 = 0.5 retention: exactly at threshold, bonus applies
        assert_eq!(view_amount(&r, 500, 1000), dec("9.35"));
    }

    #[test]
    fn test_watch_minutes_floor() {
        let r = rates("0.5", "1", "0.1", "1");
        // 59s is zero full minutes
        assert_eq!(view_amount(&r, 59, 6000), dec("0.50"));
        assert_eq!(view_amount(&r, 60, 6000), dec("1.50"));
    }

    #[test]
    fn test_zero_video_duration_earns_no_bonus() {
        let r = rates("0.5", "1", "0.1", "0.5");
        assert_eq!(view_amount(&r, 600, 0), dec("10.50"));
    }

    #[test]
    fn test_retention_capped_at_one() {
        // Watching past the end (replays) never exceeds 100% retention
        let r = rates("0.5", "1", "0.1", "0.5");
        assert_eq!(view_amount(&r, 1200, 600), dec("22.55"));
    }

    #[test]
    fn test_round_currency_half_up() {
        assert_eq!(round_currency(dec("1.005")), dec("1.01"));
        assert_eq!(round_currency(dec("1.004")), dec("1.00"));
        assert_eq!(round_currency(dec("7.154999")), dec("7.15"));
    }

    #[test]
    fn test_engagement_rate_lookup() {
        let r = rates("0.5", "1", "0.1", "0.5");
        assert_eq!(r.engagement_rate(EarningKind::Like), dec("0.05"));
        assert_eq!(r.engagement_rate(EarningKind::Comment), dec("0.10"));
        assert_eq!(r.engagement_rate(EarningKind::Share), dec("0.15"));
        assert_eq!(r.engagement_rate(EarningKind::View), Decimal::ZERO);
    }
}

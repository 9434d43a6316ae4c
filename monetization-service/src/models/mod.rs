use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of economic event a ledger entry records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EarningKind {
    /// Watch-session earnings (deduplicated per session)
    View,
    /// Flat bonus for a like
    Like,
    /// Flat bonus for a comment
    Comment,
    /// Flat bonus for a share
    Share,
}

impl EarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningKind::View => "view",
            EarningKind::Like => "like",
            EarningKind::Comment => "comment",
            EarningKind::Share => "share",
        }
    }

    /// True for the one-shot social bonus kinds
    pub fn is_engagement(&self) -> bool {
        !matches!(self, EarningKind::View)
    }
}

impl fmt::Display for EarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EarningKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(EarningKind::View),
            "like" => Ok(EarningKind::Like),
            "comment" => Ok(EarningKind::Comment),
            "share" => Ok(EarningKind::Share),
            other => Err(format!("unknown earning kind: {}", other)),
        }
    }
}

/// Ledger entry payout lifecycle. Transitions pending -> approved -> paid
/// happen only in the payout workflow, never here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EarningStatus {
    Pending,
    Approved,
    Paid,
}

impl EarningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningStatus::Pending => "pending",
            EarningStatus::Approved => "approved",
            EarningStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for EarningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EarningStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EarningStatus::Pending),
            "approved" => Ok(EarningStatus::Approved),
            "paid" => Ok(EarningStatus::Paid),
            other => Err(format!("unknown earning status: {}", other)),
        }
    }
}

/// A creator's monetization account. The three totals are mutated only
/// through atomic SQL increments issued by the accrual engines, the weekly
/// aggregator, and the payout workflow; `reconcile` is the sole full-recompute
/// path.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CreatorAccount {
    pub id: Uuid,
    pub verified: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_earnings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pending_earnings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub paid_earnings: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One accrual on the earnings ledger.
///
/// View-kind entries are unique per (creator, video, session) and may have
/// their amount replaced when a session is revisited with a longer duration;
/// engagement-kind entries are immutable one-shot bonuses.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub video_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub kind: EarningKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: EarningStatus,
    pub description: String,
    pub rate_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for LedgerEntry {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let kind: String = row.try_get("kind")?;
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            creator_id: row.try_get("creator_id")?,
            video_id: row.try_get("video_id")?,
            session_id: row.try_get("session_id")?,
            kind: kind.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
                index: "kind".into(),
                source: e.into(),
            })?,
            amount: row.try_get("amount")?,
            status: status
                .parse()
                .map_err(|e: String| sqlx::Error::ColumnDecode {
                    index: "status".into(),
                    source: e.into(),
                })?,
            description: row.try_get("description")?,
            rate_version: row.try_get("rate_version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Frozen weekly earnings summary, written once by the weekly aggregator
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WeeklyEarningsSnapshot {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub week_number: String,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub total_views: i64,
    pub total_watch_minutes: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_earnings: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// One version of the earning rate configuration. Versions are append-only;
/// every ledger entry records the version that priced it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RateSchedule {
    pub version: i32,
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
    pub created_at: DateTime<Utc>,
}

impl RateSchedule {
    /// Flat bonus amount for an engagement kind (zero for views)
    pub fn engagement_rate(&self, kind: EarningKind) -> Decimal {
        match kind {
            EarningKind::Like => self.per_like,
            EarningKind::Comment => self.per_comment,
            EarningKind::Share => self.per_share,
            EarningKind::View => Decimal::ZERO,
        }
    }
}

/// Watch-session telemetry row. Read-only to the accrual engines except for
/// the monotonic duration upsert at ingest.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WatchSession {
    pub session_id: String,
    pub video_id: Uuid,
    pub creator_id: Uuid,
    pub watch_duration_seconds: i32,
    pub watch_percentage: Option<f32>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reason an accrual call created no ledger entry. Policy, not an error.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    CreatorNotVerified,
    NoWatchDuration,
    ZeroRate,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::CreatorNotVerified => "creator_not_verified",
            SkipReason::NoWatchDuration => "no_watch_duration",
            SkipReason::ZeroRate => "zero_rate",
        }
    }
}

/// Result of one accrual invocation
#[derive(Debug, Clone)]
pub enum AccrualOutcome {
    /// A new ledger entry was inserted and the balance credited in full
    Created(LedgerEntry),
    /// An existing view entry was re-priced; the balance moved by the delta
    Updated(LedgerEntry),
    /// Policy-skip: no entry, no balance change
    Skipped(SkipReason),
}

impl AccrualOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccrualOutcome::Created(_) => "created",
            AccrualOutcome::Updated(_) => "updated",
            AccrualOutcome::Skipped(_) => "skipped",
        }
    }
}

/// The three stored balance totals, as a unit
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BalanceTotals {
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pending: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub paid: Decimal,
}

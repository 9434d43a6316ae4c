use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EarningKind, EarningStatus, LedgerEntry};

/// Parameters for a fresh ledger insert
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub creator_id: Uuid,
    pub video_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub kind: EarningKind,
    pub amount: Decimal,
    pub description: String,
    pub rate_version: i32,
}

const ENTRY_COLUMNS: &str = "id, creator_id, video_id, session_id, kind, amount, status, \
                             description, rate_version, created_at, updated_at";

/// Row-lock and return the view entry for a viewing session, if one exists.
/// Serializes concurrent accruals for the same session key.
pub async fn find_view_entry_for_update(
    conn: &mut PgConnection,
    creator_id: Uuid,
    video_id: Uuid,
    session_id: &str,
) -> Result<Option<LedgerEntry>> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        SELECT {ENTRY_COLUMNS}
        FROM earnings_ledger
        WHERE creator_id = $1 AND video_id = $2 AND session_id = $3 AND kind = 'view'
        FOR UPDATE
        "#,
    ))
    .bind(creator_id)
    .bind(video_id)
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(entry)
}

/// Insert a view entry guarded by the per-session unique index.
/// Returns None when a concurrent writer got there first.
pub async fn insert_view_entry(
    conn: &mut PgConnection,
    new: &NewLedgerEntry,
) -> Result<Option<LedgerEntry>> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        INSERT INTO earnings_ledger
            (creator_id, video_id, session_id, kind, amount, status, description, rate_version)
        VALUES ($1, $2, $3, 'view', $4, 'pending', $5, $6)
        ON CONFLICT (creator_id, video_id, session_id) WHERE kind = 'view' DO NOTHING
        RETURNING {ENTRY_COLUMNS}
        "#,
    ))
    .bind(new.creator_id)
    .bind(new.video_id)
    .bind(new.session_id.as_deref())
    .bind(new.amount)
    .bind(&new.description)
    .bind(new.rate_version)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(entry)
}

/// Plain insert for entries with no dedup key (engagement bonuses, weekly totals)
pub async fn insert_entry(conn: &mut PgConnection, new: &NewLedgerEntry) -> Result<LedgerEntry> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        INSERT INTO earnings_ledger
            (creator_id, video_id, session_id, kind, amount, status, description, rate_version)
        VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
        RETURNING {ENTRY_COLUMNS}
        "#,
    ))
    .bind(new.creator_id)
    .bind(new.video_id)
    .bind(new.session_id.as_deref())
    .bind(new.kind.as_str())
    .bind(new.amount)
    .bind(&new.description)
    .bind(new.rate_version)
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry)
}

/// Replace the amount of an existing view entry (session revisit)
pub async fn update_amount(
    conn: &mut PgConnection,
    entry_id: Uuid,
    amount: Decimal,
    rate_version: i32,
) -> Result<LedgerEntry> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        UPDATE earnings_ledger
        SET amount = $2, rate_version = $3, updated_at = now()
        WHERE id = $1
        RETURNING {ENTRY_COLUMNS}
        "#,
    ))
    .bind(entry_id)
    .bind(amount)
    .bind(rate_version)
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry)
}

/// Sum of amounts grouped by status for one creator
pub async fn sums_by_status(
    conn: &mut PgConnection,
    creator_id: Uuid,
) -> Result<Vec<(String, Decimal)>> {
    let rows: Vec<(String, Decimal)> = sqlx::query_as(
        r#"
        SELECT status, COALESCE(SUM(amount), 0)
        FROM earnings_ledger
        WHERE creator_id = $1
        GROUP BY status
        "#,
    )
    .bind(creator_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Whether any ledger description carries the given week tag.
/// The weekly aggregator's idempotency guard.
pub async fn week_tag_exists(pool: &PgPool, tag: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM earnings_ledger
            WHERE description LIKE '%' || $1 || '%'
        )
        "#,
    )
    .bind(tag)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Total accrued amount in a time window, regardless of status
pub async fn earnings_between(
    pool: &PgPool,
    creator_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM earnings_ledger
        WHERE creator_id = $1 AND created_at >= $2 AND created_at <= $3
        "#,
    )
    .bind(creator_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(total)
}

/// Paginated ledger listing, newest first
pub async fn list_entries(
    pool: &PgPool,
    creator_id: Uuid,
    status: Option<EarningStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntry>> {
    let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        SELECT {ENTRY_COLUMNS}
        FROM earnings_ledger
        WHERE creator_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    ))
    .bind(creator_id)
    .bind(status.map(|s| s.as_str()))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

pub async fn count_entries(
    pool: &PgPool,
    creator_id: Uuid,
    status: Option<EarningStatus>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM earnings_ledger
        WHERE creator_id = $1 AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(creator_id)
    .bind(status.map(|s| s.as_str()))
    .fetch_one(pool)
    .await?;

    Ok(count)
}

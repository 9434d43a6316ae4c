use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::WeeklyEarningsSnapshot;

#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub creator_id: Uuid,
    pub week_number: String,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub total_views: i64,
    pub total_watch_minutes: i64,
    pub total_earnings: Decimal,
}

/// Insert a weekly snapshot. Returns None when one already exists for
/// (creator, week); the caller treats that as an idempotent no-op.
pub async fn insert_snapshot(
    conn: &mut PgConnection,
    new: &NewSnapshot,
) -> Result<Option<WeeklyEarningsSnapshot>> {
    let snapshot = sqlx::query_as::<_, WeeklyEarningsSnapshot>(
        r#"
        INSERT INTO weekly_earnings_snapshots
            (creator_id, week_number, week_start, week_end,
             total_views, total_watch_minutes, total_earnings, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'completed')
        ON CONFLICT (creator_id, week_number) DO NOTHING
        RETURNING id, creator_id, week_number, week_start, week_end,
                  total_views, total_watch_minutes, total_earnings, status, created_at
        "#,
    )
    .bind(new.creator_id)
    .bind(&new.week_number)
    .bind(new.week_start)
    .bind(new.week_end)
    .bind(new.total_views)
    .bind(new.total_watch_minutes)
    .bind(new.total_earnings)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(snapshot)
}

/// Latest snapshots for a creator, newest first
pub async fn history(
    pool: &PgPool,
    creator_id: Uuid,
    weeks_back: i64,
) -> Result<Vec<WeeklyEarningsSnapshot>> {
    let snapshots = sqlx::query_as::<_, WeeklyEarningsSnapshot>(
        r#"
        SELECT id, creator_id, week_number, week_start, week_end,
               total_views, total_watch_minutes, total_earnings, status, created_at
        FROM weekly_earnings_snapshots
        WHERE creator_id = $1
        ORDER BY week_start DESC
        LIMIT $2
        "#,
    )
    .bind(creator_id)
    .bind(weeks_back)
    .fetch_all(pool)
    .await?;

    Ok(snapshots)
}

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EarningKind, WatchSession};

/// Per-window engagement counts read straight from the social-event source
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementCounts {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

/// Cumulative per-video counters the weekly aggregator reads
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VideoStat {
    pub video_id: Uuid,
    pub view_count: i64,
    pub total_watch_minutes: i64,
}

/// Upsert a heartbeat report. Duration only ever grows: a late or
/// out-of-order heartbeat never shrinks the recorded watch time.
pub async fn upsert_watch_session(
    pool: &PgPool,
    session_id: &str,
    video_id: Uuid,
    creator_id: Uuid,
    watch_duration_seconds: i32,
    watch_percentage: Option<f32>,
    started_at: Option<DateTime<Utc>>,
) -> Result<WatchSession> {
    let session = sqlx::query_as::<_, WatchSession>(
        r#"
        INSERT INTO watch_sessions
            (session_id, video_id, creator_id, watch_duration_seconds, watch_percentage, started_at)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()))
        ON CONFLICT (session_id) DO UPDATE
        SET watch_duration_seconds =
                GREATEST(watch_sessions.watch_duration_seconds, EXCLUDED.watch_duration_seconds),
            watch_percentage = COALESCE(EXCLUDED.watch_percentage, watch_sessions.watch_percentage),
            updated_at = now()
        RETURNING session_id, video_id, creator_id, watch_duration_seconds,
                  watch_percentage, started_at, updated_at
        "#,
    )
    .bind(session_id)
    .bind(video_id)
    .bind(creator_id)
    .bind(watch_duration_seconds)
    .bind(watch_percentage)
    .bind(started_at)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

pub async fn insert_social_event(
    pool: &PgPool,
    video_id: Uuid,
    creator_id: Uuid,
    kind: EarningKind,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO social_events (video_id, creator_id, kind)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(video_id)
    .bind(creator_id)
    .bind(kind.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

/// Duration of a video in seconds; None when the video is unknown
pub async fn video_duration_seconds(pool: &PgPool, video_id: Uuid) -> Result<Option<i32>> {
    let duration: Option<i32> =
        sqlx::query_scalar("SELECT duration_seconds FROM videos WHERE id = $1")
            .bind(video_id)
            .fetch_optional(pool)
            .await?;

    Ok(duration)
}

/// Watch sessions started in a time window for a creator's videos
pub async fn session_count_between(
    pool: &PgPool,
    creator_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM watch_sessions
        WHERE creator_id = $1 AND started_at >= $2 AND started_at <= $3
        "#,
    )
    .bind(creator_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn engagement_counts_between(
    pool: &PgPool,
    creator_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<EngagementCounts> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT kind, COUNT(*)
        FROM social_events
        WHERE creator_id = $1 AND created_at >= $2 AND created_at <= $3
        GROUP BY kind
        "#,
    )
    .bind(creator_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let mut counts = EngagementCounts::default();
    for (kind, count) in rows {
        match kind.as_str() {
            "like" => counts.likes = count,
            "comment" => counts.comments = count,
            "share" => counts.shares = count,
            _ => {}
        }
    }

    Ok(counts)
}

/// All cumulative video counters for one creator
pub async fn video_stats_for_creator(pool: &PgPool, creator_id: Uuid) -> Result<Vec<VideoStat>> {
    let stats = sqlx::query_as::<_, VideoStat>(
        r#"
        SELECT video_id, view_count, total_watch_minutes
        FROM video_stats
        WHERE creator_id = $1
        "#,
    )
    .bind(creator_id)
    .fetch_all(pool)
    .await?;

    Ok(stats)
}

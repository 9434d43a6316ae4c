use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{BalanceTotals, CreatorAccount};

pub async fn find_account(pool: &PgPool, creator_id: Uuid) -> Result<Option<CreatorAccount>> {
    let account = sqlx::query_as::<_, CreatorAccount>(
        r#"
        SELECT id, verified, total_earnings, pending_earnings, paid_earnings,
               created_at, updated_at
        FROM creator_accounts
        WHERE id = $1
        "#,
    )
    .bind(creator_id)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Lock the account row for the duration of the surrounding transaction
pub async fn lock_account(
    conn: &mut PgConnection,
    creator_id: Uuid,
) -> Result<Option<CreatorAccount>> {
    let account = sqlx::query_as::<_, CreatorAccount>(
        r#"
        SELECT id, verified, total_earnings, pending_earnings, paid_earnings,
               created_at, updated_at
        FROM creator_accounts
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(creator_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(account)
}

/// Atomically credit (or debit, for a negative delta) the running totals.
/// Accruals are born pending, so total and pending move together.
pub async fn apply_earning_delta(
    conn: &mut PgConnection,
    creator_id: Uuid,
    delta: Decimal,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE creator_accounts
        SET total_earnings = total_earnings + $2,
            pending_earnings = pending_earnings + $2,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(creator_id)
    .bind(delta)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrite the stored totals with recomputed values. Reconciliation only.
pub async fn overwrite_totals(
    conn: &mut PgConnection,
    creator_id: Uuid,
    totals: &BalanceTotals,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE creator_accounts
        SET total_earnings = $2,
            pending_earnings = $3,
            paid_earnings = $4,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(creator_id)
    .bind(totals.total)
    .bind(totals.pending)
    .bind(totals.paid)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn list_verified_creator_ids(pool: &PgPool) -> Result<Vec<Uuid>> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM creator_accounts
        WHERE verified = TRUE
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

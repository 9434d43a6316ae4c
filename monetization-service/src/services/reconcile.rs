//! Balance reconciliation.
//!
//! The only sanctioned full-recompute path for creator totals. Repairs
//! drift between the stored balances and the ledger; administrative
//! trigger only, never inline with accrual.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{creator_repo, ledger_repo};
use crate::error::{AppError, Result};
use crate::metrics::RECONCILE_RUNS_TOTAL;
use crate::models::BalanceTotals;

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub creator_id: Uuid,
    pub before: BalanceTotals,
    pub after: BalanceTotals,
    pub drift: BalanceTotals,
}

#[derive(Clone)]
pub struct ReconciliationService {
    pool: PgPool,
}

impl ReconciliationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recompute a creator's totals from the ledger and overwrite the
    /// stored values. The account row stays locked while the ledger is
    /// summed so in-flight accruals for the same creator serialize behind
    /// the recompute.
    pub async fn reconcile(&self, creator_id: Uuid) -> Result<ReconcileReport> {
        let mut tx = self.pool.begin().await?;

        let account = creator_repo::lock_account(&mut *tx, creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("creator account {}", creator_id)))?;

        let before = BalanceTotals {
            total: account.total_earnings,
            pending: account.pending_earnings,
            paid: account.paid_earnings,
        };

        let sums = ledger_repo::sums_by_status(&mut *tx, creator_id).await?;

        let mut after = BalanceTotals {
            total: Decimal::ZERO,
            pending: Decimal::ZERO,
            paid: Decimal::ZERO,
        };
        for (status, sum) in sums {
            after.total += sum;
            match status.as_str() {
                "pending" => after.pending = sum,
                "paid" => after.paid = sum,
                // Approved amounts count toward the total only; they sit
                // between pending and paid in the payout lifecycle.
                _ => {}
            }
        }

        creator_repo::overwrite_totals(&mut *tx, creator_id, &after).await?;

        tx.commit().await?;

        let drift = BalanceTotals {
            total: after.total - before.total,
            pending: after.pending - before.pending,
            paid: after.paid - before.paid,
        };

        if drift.total != Decimal::ZERO
            || drift.pending != Decimal::ZERO
            || drift.paid != Decimal::ZERO
        {
            warn!(
                creator_id = %creator_id,
                total_drift = %drift.total,
                pending_drift = %drift.pending,
                paid_drift = %drift.paid,
                "Balance drift corrected during reconciliation"
            );
        } else {
            info!(creator_id = %creator_id, "Balances already consistent with ledger");
        }

        RECONCILE_RUNS_TOTAL.inc();

        Ok(ReconcileReport {
            creator_id,
            before,
            after,
            drift,
        })
    }
}

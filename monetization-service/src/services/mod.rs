pub mod accrual;
pub mod rates;
pub mod reconcile;
pub mod stats;
pub mod weekly;

pub use accrual::AccrualService;
pub use rates::RateService;
pub use reconcile::ReconciliationService;
pub use stats::EarningsStatsService;
pub use weekly::WeeklyAggregator;

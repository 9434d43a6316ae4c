pub mod creator_repo;
pub mod ledger_repo;
pub mod snapshot_repo;
pub mod telemetry_repo;

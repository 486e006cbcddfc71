/// Foods, workers, plates and depots, plus seeding them from config
pub mod catalog;
/// Per-call deadline and cancellation
pub mod context;
/// Plate depot stock
pub mod depot;
/// Exception reports and plate reclamation
pub mod maintenance;
/// Order settlement and lifecycle
pub mod order;
/// Plate binding and plate reads
pub mod plate;
/// Plate status state machine
pub mod plate_state;
/// Weight-based pricing in cents
pub mod pricing;
/// Retry policy for transient store failures
pub mod retry;
/// Write transactions that lock up front
pub mod store;
/// User accounts
pub mod user;
/// Wallet balances and the ledger
pub mod wallet;

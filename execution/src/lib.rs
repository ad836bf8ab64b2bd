mod ledger;
mod reconcile;

pub use ledger::{timestamp, Ledger, LedgerError, Snapshot, WithdrawalRequest};
pub use reconcile::{Phase, Reconciler, SyncError};

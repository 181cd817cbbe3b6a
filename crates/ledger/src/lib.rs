//! Client for the internal currency ledger.
//!
//! The ledger is the other half of the submission saga: funds are
//! debited before the remote job call, and a compensating refund is
//! issued when the job fails. Refunds are idempotent by transaction ID
//! on the ledger side; this client retries transient refund failures a
//! bounded number of times and flags the transaction for manual
//! reconciliation when the retries are exhausted.

pub mod api;
pub mod service;

pub use api::{LedgerApi, LedgerConfig, LedgerError};
pub use service::{DebitRequest, LedgerService, TransactionType};

//! Seam trait over the ledger client.

use async_trait::async_trait;

use crate::api::LedgerError;

/// What a transaction paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Generation,
    Training,
}

impl TransactionType {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Generation => "generation",
            TransactionType::Training => "training",
        }
    }
}

/// A debit to perform before a remote submission.
#[derive(Debug, Clone)]
pub struct DebitRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: u64,
    pub transaction_type: TransactionType,
    /// Human-readable description stored with the transaction.
    pub details: String,
}

/// Debit/refund operations the orchestration core needs from the ledger.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Debit funds. Returns the new transaction ID, or
    /// [`LedgerError::InsufficientFunds`] when the account cannot cover
    /// the amount.
    async fn debit(&self, request: DebitRequest) -> Result<String, LedgerError>;

    /// Refund a transaction with a descriptive reason. Idempotent by
    /// transaction ID on the ledger side.
    async fn refund(&self, transaction_id: &str, reason: &str) -> Result<(), LedgerError>;
}

use thiserror::Error;

use crate::{
    db_types::{NewTransaction, PaymentState, Settlement, Transaction, TransactionId, TransactionStatus},
    transaction_objects::TransactionQueryFilter,
};

#[derive(Debug, Clone, Error)]
pub enum TransactionLedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(TransactionId),
    #[error("Transaction {0} already exists")]
    TransactionAlreadyExists(TransactionId),
    #[error("Transaction {transaction_id} is {actual}, but was expected to be {expected}")]
    StatusConflict { transaction_id: TransactionId, expected: TransactionStatus, actual: TransactionStatus },
    #[error("A refund of transaction {0} is already in progress")]
    RefundInProgress(TransactionId),
    #[error("A transaction cannot move from {from} to {to}")]
    ForbiddenTransition { from: TransactionStatus, to: TransactionStatus },
    #[error("Stored transaction is invalid. {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for TransactionLedgerError {
    fn from(e: sqlx::Error) -> Self {
        TransactionLedgerError::DatabaseError(e.to_string())
    }
}

/// The durable record of every payment. It is the single source of truth for what happened to a transaction; the
/// external systems are only ever consulted, never trusted to remember.
#[allow(async_fn_in_trait)]
pub trait TransactionLedger {
    /// Stores a new `Pending` transaction with no payer.
    async fn insert_transaction(&self, transaction: NewTransaction) -> Result<Transaction, TransactionLedgerError>;

    async fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, TransactionLedgerError>;

    /// Looks a transaction up by the banking system's reference for its principal transfer.
    async fn fetch_transaction_by_ledger_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, TransactionLedgerError>;

    /// Moves the transaction from `expected` to `state`, atomically.
    ///
    /// The write only happens if the stored status is still `expected`; otherwise `StatusConflict` is returned and
    /// nothing changes. Transitions that the state machine forbids fail with `ForbiddenTransition` before touching
    /// the database. Once a payer is stored it is never replaced. `settlement` is only written when supplied.
    async fn update_state(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        state: &PaymentState,
        settlement: Option<&Settlement>,
    ) -> Result<Transaction, TransactionLedgerError>;

    /// Claims a `Completed` transaction for refunding. Only one claim can be held at a time.
    ///
    /// Fails with `RefundInProgress` if another refund holds the claim, and with `StatusConflict` if the transaction
    /// is not `Completed`.
    async fn claim_refund(&self, id: &TransactionId) -> Result<Transaction, TransactionLedgerError>;

    /// Gives up a claim taken with [`claim_refund`](Self::claim_refund). Only call this if no money went back to the
    /// payer.
    async fn release_refund_claim(&self, id: &TransactionId) -> Result<(), TransactionLedgerError>;

    /// Fetches transactions matching the filter, oldest first.
    async fn search_transactions(&self, query: TransactionQueryFilter)
        -> Result<Vec<Transaction>, TransactionLedgerError>;
}

use thiserror::Error;

use crate::{
    db_types::{AccountId, Money, PaymentToken, TokenId, TransactionId},
    traits::{AccountDirectoryError, IdentityGatewayError, TokenStoreError, TransactionLedgerError},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Not ready for payment. {0}")]
    NotReady(String),
    #[error("Payer could not be identified. {0}")]
    IdentificationFailed(String),
    #[error("Invalid transaction state. {0}")]
    InvalidState(String),
    #[error("Payment processing failed. {0}")]
    PaymentProcessingError(String),
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(TransactionId),
    #[error("Payment amounts must be positive, but got {0}")]
    InvalidAmount(Money),
    #[error("'{0}' is not a three-letter currency code")]
    InvalidCurrency(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<TransactionLedgerError> for PaymentFlowError {
    fn from(e: TransactionLedgerError) -> Self {
        match e {
            TransactionLedgerError::TransactionNotFound(id) => Self::TransactionNotFound(id),
            TransactionLedgerError::StatusConflict { .. } |
            TransactionLedgerError::ForbiddenTransition { .. } |
            TransactionLedgerError::RefundInProgress(_) => Self::InvalidState(e.to_string()),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<TokenStoreError> for PaymentFlowError {
    fn from(e: TokenStoreError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<AccountDirectoryError> for PaymentFlowError {
    fn from(e: AccountDirectoryError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum TokenApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Account {0} does not exist")]
    AccountNotFound(AccountId),
    #[error("Account {0} has no default payment token")]
    NoDefaultToken(AccountId),
    #[error("The payment token {0} is already linked to an account")]
    TokenAlreadyLinked(PaymentToken),
    #[error("Token {token_id} does not belong to account {account_id}")]
    TokenNotFound { account_id: AccountId, token_id: TokenId },
    #[error("Token {0} has been retired")]
    TokenInactive(TokenId),
    #[error("The card could not be verified by the banking system")]
    CardVerificationFailed,
}

impl From<TokenStoreError> for TokenApiError {
    fn from(e: TokenStoreError) -> Self {
        match e {
            TokenStoreError::DatabaseError(s) => Self::DatabaseError(s),
            TokenStoreError::AccountNotFound(id) => Self::AccountNotFound(id),
            TokenStoreError::TokenAlreadyLinked(t) => Self::TokenAlreadyLinked(t),
            TokenStoreError::TokenNotFound { account_id, token_id } => Self::TokenNotFound { account_id, token_id },
            TokenStoreError::TokenInactive(id) => Self::TokenInactive(id),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Account {0} does not exist")]
    AccountNotFound(AccountId),
    #[error("Account {0} already exists")]
    AccountAlreadyExists(AccountId),
    #[error("Biometric service error. {0}")]
    BiometricServiceError(String),
    #[error("The biometric service refused the request for account {0}")]
    BiometricRequestRejected(AccountId),
}

impl From<AccountDirectoryError> for AccountApiError {
    fn from(e: AccountDirectoryError) -> Self {
        match e {
            AccountDirectoryError::DatabaseError(s) => Self::DatabaseError(s),
            AccountDirectoryError::AccountNotFound(id) => Self::AccountNotFound(id),
            AccountDirectoryError::AccountAlreadyExists(id) => Self::AccountAlreadyExists(id),
        }
    }
}

impl From<TransactionLedgerError> for AccountApiError {
    fn from(e: TransactionLedgerError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<IdentityGatewayError> for AccountApiError {
    fn from(e: IdentityGatewayError) -> Self {
        Self::BiometricServiceError(e.to_string())
    }
}

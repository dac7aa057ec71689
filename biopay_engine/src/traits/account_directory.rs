use thiserror::Error;

use crate::db_types::{Account, AccountId, NewAccount};

#[derive(Debug, Clone, Error)]
pub enum AccountDirectoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Account {0} does not exist")]
    AccountNotFound(AccountId),
    #[error("Account {0} already exists")]
    AccountAlreadyExists(AccountId),
}

impl From<sqlx::Error> for AccountDirectoryError {
    fn from(e: sqlx::Error) -> Self {
        AccountDirectoryError::DatabaseError(e.to_string())
    }
}

/// The slice of the account directory that the payment engine needs: creating accounts, reading their readiness
/// flags, and recording biometric enrollment. Full user management lives elsewhere.
#[allow(async_fn_in_trait)]
pub trait AccountDirectory {
    async fn create_account(&self, account: NewAccount) -> Result<Account, AccountDirectoryError>;

    /// Fetches the account with the given id. If no account exists, `None` is returned.
    async fn fetch_account(&self, id: AccountId) -> Result<Option<Account>, AccountDirectoryError>;

    /// Records the biometric profile for the account. Passing `None` clears the enrollment.
    async fn set_face_enrolled(&self, id: AccountId, face_id: Option<&str>) -> Result<Account, AccountDirectoryError>;
}

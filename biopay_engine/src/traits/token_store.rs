use thiserror::Error;

use crate::{
    db_types::{AccountId, NewSettlementToken, PaymentToken, SettlementToken, TokenId},
    traits::data_objects::RetiredToken,
};

#[derive(Debug, Clone, Error)]
pub enum TokenStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Account {0} does not exist")]
    AccountNotFound(AccountId),
    #[error("The payment token {0} is already linked to an account")]
    TokenAlreadyLinked(PaymentToken),
    #[error("Token {token_id} does not belong to account {account_id}")]
    TokenNotFound { account_id: AccountId, token_id: TokenId },
    #[error("Token {0} has been retired")]
    TokenInactive(TokenId),
}

impl From<sqlx::Error> for TokenStoreError {
    fn from(e: sqlx::Error) -> Self {
        TokenStoreError::DatabaseError(e.to_string())
    }
}

/// Owns the mapping from accounts to settlement tokens.
///
/// Implementations must guarantee that an account never has more than one default token, even when
/// [`Self::set_default_token`], [`Self::link_token`] and [`Self::retire_token`] race against each other.
#[allow(async_fn_in_trait)]
pub trait PaymentTokenStore {
    /// Links a new token to the account.
    ///
    /// * The token is rejected if it has ever been linked to any account, including this one.
    /// * The account's first active token becomes the default. `make_default` forces it to be the default regardless.
    /// * The account is marked as funding ready.
    async fn link_token(&self, account: AccountId, token: NewSettlementToken)
        -> Result<SettlementToken, TokenStoreError>;

    /// The current default token for the account, if any.
    async fn fetch_default_token(&self, account: AccountId) -> Result<Option<SettlementToken>, TokenStoreError>;

    /// All active tokens for the account, oldest first.
    async fn fetch_tokens(&self, account: AccountId) -> Result<Vec<SettlementToken>, TokenStoreError>;

    /// Makes `token_id` the account's default token, clearing the previous default in the same database transaction.
    /// Retired tokens and tokens belonging to other accounts are rejected.
    async fn set_default_token(&self, account: AccountId, token_id: TokenId)
        -> Result<SettlementToken, TokenStoreError>;

    /// Soft-deletes the token. If it was the default, the oldest remaining active token is promoted; if there is none,
    /// the account is no longer funding ready.
    async fn retire_token(&self, account: AccountId, token_id: TokenId) -> Result<RetiredToken, TokenStoreError>;

    /// Stamps the token's `last_used_at` with the current time.
    async fn touch_token(&self, token: &PaymentToken) -> Result<(), TokenStoreError>;
}

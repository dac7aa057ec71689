//! `SqliteDatabase` is a concrete implementation of a BioPay engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`traits`]
//! module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use log::*;
use sqlx::{migrate, migrate::MigrateError, SqlitePool};

use super::db::{accounts, db_url, new_pool, tokens, transactions};
use crate::{
    db_types::{
        Account,
        AccountId,
        NewAccount,
        NewSettlementToken,
        NewTransaction,
        PaymentState,
        PaymentToken,
        Settlement,
        SettlementToken,
        TokenId,
        Transaction,
        TransactionId,
        TransactionStatus,
    },
    traits::{
        AccountDirectory,
        AccountDirectoryError,
        PaymentTokenStore,
        RetiredToken,
        TokenStoreError,
        TransactionLedger,
        TransactionLedgerError,
    },
    transaction_objects::TransactionQueryFilter,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl TransactionLedger for SqliteDatabase {
    async fn insert_transaction(&self, transaction: NewTransaction) -> Result<Transaction, TransactionLedgerError> {
        let mut tx = self.pool.begin().await?;
        let inserted = transactions::insert_transaction(transaction, &mut tx).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, TransactionLedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_transaction(id, &mut conn).await
    }

    async fn fetch_transaction_by_ledger_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, TransactionLedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_ledger_reference(reference, &mut conn).await
    }

    async fn update_state(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        state: &PaymentState,
        settlement: Option<&Settlement>,
    ) -> Result<Transaction, TransactionLedgerError> {
        let next = state.status();
        if !expected.can_transition_to(next) {
            warn!("🗃️ Refusing to move transaction [{id}] from {expected} to {next}");
            return Err(TransactionLedgerError::ForbiddenTransition { from: expected, to: next });
        }
        let mut tx = self.pool.begin().await?;
        if let Some(updated) = transactions::update_state(id, expected, state, settlement, &mut tx).await? {
            tx.commit().await?;
            debug!("🗃️ Transaction [{id}] is now {next}");
            return Ok(updated);
        }
        // Nothing was written. Work out why.
        let current = transactions::fetch_transaction(id, &mut tx).await?;
        tx.rollback().await?;
        match current {
            None => Err(TransactionLedgerError::TransactionNotFound(id.clone())),
            Some(current) => {
                debug!("🗃️ Transaction [{id}] is {}, not {expected}. {next} was not written.", current.status());
                Err(TransactionLedgerError::StatusConflict {
                    transaction_id: id.clone(),
                    expected,
                    actual: current.status(),
                })
            },
        }
    }

    async fn claim_refund(&self, id: &TransactionId) -> Result<Transaction, TransactionLedgerError> {
        let mut tx = self.pool.begin().await?;
        let claimed = transactions::claim_refund(id, &mut tx).await?;
        let current = transactions::fetch_transaction(id, &mut tx).await?;
        match (claimed, current) {
            (true, Some(current)) => {
                tx.commit().await?;
                debug!("🗃️ Transaction [{id}] is claimed for refunding");
                Ok(current)
            },
            (_, None) => Err(TransactionLedgerError::TransactionNotFound(id.clone())),
            (false, Some(current)) if current.status() == TransactionStatus::Completed => {
                debug!("🗃️ Transaction [{id}] is already being refunded");
                Err(TransactionLedgerError::RefundInProgress(id.clone()))
            },
            (false, Some(current)) => Err(TransactionLedgerError::StatusConflict {
                transaction_id: id.clone(),
                expected: TransactionStatus::Completed,
                actual: current.status(),
            }),
        }
    }

    async fn release_refund_claim(&self, id: &TransactionId) -> Result<(), TransactionLedgerError> {
        let mut tx = self.pool.begin().await?;
        let released = transactions::release_refund_claim(id, &mut tx).await?;
        tx.commit().await?;
        if released {
            debug!("🗃️ Refund claim on transaction [{id}] released");
        } else {
            warn!("🗃️ Refund claim on transaction [{id}] was not released. It is no longer completed.");
        }
        Ok(())
    }

    async fn search_transactions(
        &self,
        query: TransactionQueryFilter,
    ) -> Result<Vec<Transaction>, TransactionLedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::search_transactions(query, &mut conn).await
    }
}

impl PaymentTokenStore for SqliteDatabase {
    /// In a single atomic transaction:
    /// * locks the account row, failing if the account does not exist,
    /// * rejects tokens that have been linked before, to any account,
    /// * clears the previous default if the new token is to become the default,
    /// * stores the token and marks the account as funding ready.
    async fn link_token(
        &self,
        account: AccountId,
        token: NewSettlementToken,
    ) -> Result<SettlementToken, TokenStoreError> {
        let mut tx = self.pool.begin().await?;
        if !accounts::lock_account(account, &mut tx).await? {
            return Err(TokenStoreError::AccountNotFound(account));
        }
        if tokens::fetch_token_by_value(&token.token, &mut tx).await?.is_some() {
            warn!("💳️ Token {} is already linked. Account #{account} cannot link it again.", token.token);
            return Err(TokenStoreError::TokenAlreadyLinked(token.token));
        }
        let active = tokens::fetch_active_tokens(account, &mut tx).await?;
        let make_default = token.make_default || !active.iter().any(|t| t.is_default);
        if make_default {
            tokens::clear_default(account, &mut tx).await?;
        }
        let value = token.token.clone();
        let linked = match tokens::insert_token(account, token, make_default, &mut tx).await {
            Ok(linked) => linked,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(TokenStoreError::TokenAlreadyLinked(value));
            },
            Err(e) => return Err(e.into()),
        };
        accounts::set_funding_ready(account, true, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "💳️ Token {} (#{}) linked to account #{account}{}",
            linked.token,
            linked.id,
            if linked.is_default { " as the default" } else { "" }
        );
        Ok(linked)
    }

    async fn fetch_default_token(&self, account: AccountId) -> Result<Option<SettlementToken>, TokenStoreError> {
        let mut conn = self.pool.acquire().await?;
        let token = tokens::fetch_default_token(account, &mut conn).await?;
        Ok(token)
    }

    async fn fetch_tokens(&self, account: AccountId) -> Result<Vec<SettlementToken>, TokenStoreError> {
        let mut conn = self.pool.acquire().await?;
        let tokens = tokens::fetch_active_tokens(account, &mut conn).await?;
        Ok(tokens)
    }

    async fn set_default_token(
        &self,
        account: AccountId,
        token_id: TokenId,
    ) -> Result<SettlementToken, TokenStoreError> {
        let mut tx = self.pool.begin().await?;
        if !accounts::lock_account(account, &mut tx).await? {
            return Err(TokenStoreError::AccountNotFound(account));
        }
        let token = tokens::fetch_token(account, token_id, &mut tx)
            .await?
            .ok_or(TokenStoreError::TokenNotFound { account_id: account, token_id })?;
        if !token.is_active {
            return Err(TokenStoreError::TokenInactive(token_id));
        }
        if token.is_default {
            trace!("💳️ Token #{token_id} is already the default for account #{account}");
            tx.commit().await?;
            return Ok(token);
        }
        tokens::clear_default(account, &mut tx).await?;
        let token = tokens::mark_default(token_id, &mut tx).await?;
        tx.commit().await?;
        debug!("💳️ Token #{token_id} is now the default for account #{account}");
        Ok(token)
    }

    async fn retire_token(&self, account: AccountId, token_id: TokenId) -> Result<RetiredToken, TokenStoreError> {
        let mut tx = self.pool.begin().await?;
        if !accounts::lock_account(account, &mut tx).await? {
            return Err(TokenStoreError::AccountNotFound(account));
        }
        let token = tokens::fetch_token(account, token_id, &mut tx)
            .await?
            .ok_or(TokenStoreError::TokenNotFound { account_id: account, token_id })?;
        if !token.is_active {
            return Err(TokenStoreError::TokenInactive(token_id));
        }
        let retired = tokens::retire(token_id, &mut tx).await?;
        let remaining = tokens::fetch_active_tokens(account, &mut tx).await?;
        let promoted = match (token.is_default, remaining.first()) {
            (true, Some(next)) => Some(tokens::mark_default(next.id, &mut tx).await?),
            _ => None,
        };
        let funding_ready = !remaining.is_empty();
        if !funding_ready {
            accounts::set_funding_ready(account, false, &mut tx).await?;
        }
        tx.commit().await?;
        match &promoted {
            Some(p) => debug!("💳️ Token #{token_id} retired. Token #{} is the new default for #{account}", p.id),
            None if funding_ready => debug!("💳️ Token #{token_id} retired from account #{account}"),
            None => info!("💳️ Token #{token_id} retired. Account #{account} has no payment tokens left."),
        }
        Ok(RetiredToken { retired, promoted, funding_ready })
    }

    async fn touch_token(&self, token: &PaymentToken) -> Result<(), TokenStoreError> {
        let mut tx = self.pool.begin().await?;
        let touched = tokens::touch(token, &mut tx).await?;
        tx.commit().await?;
        if touched == 0 {
            warn!("💳️ Could not record the use of token {token}. It is not in the token store.");
        }
        Ok(())
    }
}

impl AccountDirectory for SqliteDatabase {
    async fn create_account(&self, account: NewAccount) -> Result<Account, AccountDirectoryError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::insert_account(account, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn fetch_account(&self, id: AccountId) -> Result<Option<Account>, AccountDirectoryError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_account(id, &mut conn).await?;
        Ok(account)
    }

    async fn set_face_enrolled(&self, id: AccountId, face_id: Option<&str>) -> Result<Account, AccountDirectoryError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::set_face_enrolled(id, face_id, &mut tx).await?;
        tx.commit().await?;
        account.ok_or(AccountDirectoryError::AccountNotFound(id))
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) {
        self.pool.close().await;
    }
}

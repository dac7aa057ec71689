//! Unifies API for accessing accounts, their payment histories and their biometric enrolment.

use std::fmt::Debug;

use log::*;

use crate::{
    bpe_api::errors::AccountApiError,
    db_types::{Account, AccountId, NewAccount, Transaction},
    traits::{AccountDirectory, IdentityGateway, TransactionLedger},
    transaction_objects::TransactionQueryFilter,
};

/// The `AccountApi` provides a unified API for accessing accounts.
pub struct AccountApi<B, I> {
    db: B,
    identity: I,
}

impl<B: Debug, I> Debug for AccountApi<B, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B, I> AccountApi<B, I>
where
    B: AccountDirectory + TransactionLedger,
    I: IdentityGateway,
{
    pub fn new(db: B, identity: I) -> Self {
        Self { db, identity }
    }

    pub async fn create_account(&self, account: NewAccount) -> Result<Account, AccountApiError> {
        let account = self.db.create_account(account).await?;
        info!("🧑️ {} account #{} created for {}", account.kind, account.id, account.display_name);
        Ok(account)
    }

    /// Fetches the account for the given id. If no account exists, `None` is returned.
    pub async fn account(&self, id: AccountId) -> Result<Option<Account>, AccountApiError> {
        let account = self.db.fetch_account(id).await?;
        Ok(account)
    }

    /// Every transaction the account has paid for, oldest first.
    pub async fn payment_history(&self, payer: AccountId) -> Result<Vec<Transaction>, AccountApiError> {
        let history = self.db.search_transactions(TransactionQueryFilter::default().with_payer(payer)).await?;
        trace!("🧑️ Account #{payer} has paid {} transaction(s)", history.len());
        Ok(history)
    }

    /// Every transaction paid to the merchant, oldest first.
    pub async fn sales_history(&self, payee: AccountId) -> Result<Vec<Transaction>, AccountApiError> {
        let history = self.db.search_transactions(TransactionQueryFilter::default().with_payee(payee)).await?;
        trace!("🧑️ Merchant #{payee} has {} sale(s)", history.len());
        Ok(history)
    }

    /// Links a face that the biometric service has already indexed to the account, so that the account can be
    /// identified at checkout.
    pub async fn enroll_face(&self, id: AccountId, face_id: &str) -> Result<Account, AccountApiError> {
        if self.db.fetch_account(id).await?.is_none() {
            return Err(AccountApiError::AccountNotFound(id));
        }
        if !self.identity.link_face(id, face_id).await? {
            warn!("🧑️ The biometric service would not link face {face_id} to account #{id}");
            return Err(AccountApiError::BiometricRequestRejected(id));
        }
        let account = self.db.set_face_enrolled(id, Some(face_id)).await?;
        info!("🧑️ Account #{id} enrolled a face");
        Ok(account)
    }

    /// Deletes the account's face from the biometric service, then marks the account as not enrolled.
    pub async fn remove_face(&self, id: AccountId) -> Result<Account, AccountApiError> {
        if self.db.fetch_account(id).await?.is_none() {
            return Err(AccountApiError::AccountNotFound(id));
        }
        if !self.identity.delete_face(id).await? {
            warn!("🧑️ The biometric service would not delete the face of account #{id}");
            return Err(AccountApiError::BiometricRequestRejected(id));
        }
        let account = self.db.set_face_enrolled(id, None).await?;
        info!("🧑️ Account #{id} removed its face");
        Ok(account)
    }
}

//! Read-only reporting on the fees the platform has earned.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    bpe_api::payment_objects::{FeeSplit, PlatformBalance, PLATFORM_FEE_BPS},
    db_types::{Money, Transaction, TransactionStatus},
    traits::{TransactionLedger, TransactionLedgerError},
    transaction_objects::TransactionQueryFilter,
};

pub struct PlatformApi<B> {
    db: B,
    fee_bps: i64,
}

impl<B: Debug> Debug for PlatformApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PlatformApi ({:?})", self.db)
    }
}

impl<B> PlatformApi<B>
where B: TransactionLedger
{
    pub fn new(db: B) -> Self {
        Self { db, fee_bps: PLATFORM_FEE_BPS }
    }

    /// Use a fee rate other than the standard one. It must match the rate the payment flow charges.
    pub fn with_fee_bps(mut self, fee_bps: i64) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    /// Fees and volume over every completed payment. Refunded payments are excluded, since their fee was returned.
    pub async fn platform_balance(&self) -> Result<PlatformBalance, TransactionLedgerError> {
        let query = TransactionQueryFilter::default().with_status(TransactionStatus::Completed);
        let transactions = self.db.search_transactions(query).await?;
        Ok(self.summarise(&transactions, None, None))
    }

    /// As [`Self::platform_balance`], restricted to payments created in `[since, until)`.
    pub async fn fee_summary(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PlatformBalance, TransactionLedgerError> {
        let query =
            TransactionQueryFilter::default().with_status(TransactionStatus::Completed).since(since).until(until);
        let transactions = self.db.search_transactions(query).await?;
        Ok(self.summarise(&transactions, Some(since), Some(until)))
    }

    fn summarise(
        &self,
        transactions: &[Transaction],
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> PlatformBalance {
        let total_volume: Money = transactions.iter().map(|t| t.amount).sum();
        let total_fees: Money = transactions.iter().map(|t| FeeSplit::new(t.amount, self.fee_bps).platform_fee).sum();
        let transaction_count = transactions.len() as u64;
        let average_transaction = match i64::try_from(transaction_count) {
            Ok(n) if n > 0 => Money::from(total_volume.value() / n),
            _ => Money::default(),
        };
        trace!("🔄️📊️ {transaction_count} completed payments, volume {total_volume}, fees {total_fees}");
        PlatformBalance { total_fees, total_volume, transaction_count, average_transaction, since, until }
    }
}

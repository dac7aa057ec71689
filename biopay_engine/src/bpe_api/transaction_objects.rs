use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{AccountId, TransactionStatus};

/// Search criteria for [`crate::traits::TransactionLedger::search_transactions`]. Empty fields do not constrain the
/// search; a filter with every field empty returns every transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionQueryFilter {
    pub payer: Option<AccountId>,
    pub payee: Option<AccountId>,
    pub statuses: Vec<TransactionStatus>,
    pub currency: Option<String>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
}

impl TransactionQueryFilter {
    pub fn with_payer(mut self, payer: AccountId) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn with_payee(mut self, payee: AccountId) -> Self {
        self.payee = Some(payee);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payer.is_none() &&
            self.payee.is_none() &&
            self.statuses.is_empty() &&
            self.currency.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn statuses_are_not_duplicated() {
        let filter = TransactionQueryFilter::default()
            .with_status(TransactionStatus::Pending)
            .with_status(TransactionStatus::Pending)
            .with_status(TransactionStatus::Completed);
        assert_eq!(filter.statuses, vec![TransactionStatus::Pending, TransactionStatus::Completed]);
        assert!(!filter.is_empty());
        assert!(TransactionQueryFilter::default().is_empty());
    }
}

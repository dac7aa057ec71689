use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{AccountId, Money, TransactionId};

/// A party to a money movement, as the audit relay names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditParty {
    User(AccountId),
    Merchant(AccountId),
    Platform,
}

impl Display for AuditParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditParty::User(id) => write!(f, "user_{id}"),
            AuditParty::Merchant(id) => write!(f, "merchant_{id}"),
            AuditParty::Platform => write!(f, "platform"),
        }
    }
}

/// A settled money movement to be recorded on the append-only audit relay.
///
/// Published once the transaction has been persisted as completed. Delivery is best effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecordEvent {
    /// Unique per record. The merchant leg uses the transaction id, the fee leg `{transaction_id}_FEE`.
    pub record_id: String,
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub from: AuditParty,
    pub to: AuditParty,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecordEvent {
    pub fn merchant_leg(
        transaction_id: &TransactionId,
        payer: AccountId,
        payee: AccountId,
        merchant_net: Money,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: transaction_id.to_string(),
            transaction_id: transaction_id.clone(),
            amount: merchant_net,
            from: AuditParty::User(payer),
            to: AuditParty::Merchant(payee),
            timestamp,
        }
    }

    pub fn fee_leg(transaction_id: &TransactionId, payee: AccountId, fee: Money, timestamp: DateTime<Utc>) -> Self {
        Self {
            record_id: format!("{transaction_id}_FEE"),
            transaction_id: transaction_id.clone(),
            amount: fee,
            from: AuditParty::Merchant(payee),
            to: AuditParty::Platform,
            timestamp,
        }
    }
}

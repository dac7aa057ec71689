use std::{fmt::Display, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db_types::{AccountId, Money, TransactionId, TransactionStatus};

/// The platform keeps 3% of every settled payment.
pub const PLATFORM_FEE_BPS: i64 = 300;

/// How a settled amount is shared between the merchant and the platform. `merchant_net + platform_fee == amount`
/// always holds, because the net is derived from the rounded fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSplit {
    pub amount: Money,
    pub merchant_net: Money,
    pub platform_fee: Money,
}

impl FeeSplit {
    pub fn new(amount: Money, fee_bps: i64) -> Self {
        let platform_fee = amount.basis_points(fee_bps);
        Self { amount, merchant_net: amount - platform_fee, platform_fee }
    }
}

//--------------------------------------  Transfer outcomes    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFailure {
    /// The banking system refused the transfer or could not be reached.
    Declined,
    /// No answer arrived within the configured transfer timeout.
    TimedOut(Duration),
}

impl Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferFailure::Declined => write!(f, "declined by the banking system"),
            TransferFailure::TimedOut(d) => write!(f, "timed out after {}ms", d.as_millis()),
        }
    }
}

/// A transfer whose failure decides the outcome of the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriticalTransfer {
    Settled { reference: Option<String> },
    Declined { reason: TransferFailure },
}

/// A transfer whose failure is logged and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffortTransfer {
    Settled { reference: Option<String> },
    Failed { reason: TransferFailure },
    /// Not attempted, e.g. because there is nothing to move or no platform token is configured.
    Skipped { reason: String },
}

impl BestEffortTransfer {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }
}

impl From<CriticalTransfer> for BestEffortTransfer {
    fn from(value: CriticalTransfer) -> Self {
        match value {
            CriticalTransfer::Settled { reference } => Self::Settled { reference },
            CriticalTransfer::Declined { reason } => Self::Failed { reason },
        }
    }
}

//--------------------------------------   Request / result   --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPaymentRequest {
    pub payee: AccountId,
    pub amount: Money,
    pub currency: String,
    pub description: Option<String>,
}

impl NewPaymentRequest {
    pub fn new(payee: AccountId, amount: Money, currency: &str) -> Self {
        Self { payee, amount, currency: currency.to_string(), description: None }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitiatedPayment {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub amount: Money,
}

/// The outcome of `verify_and_charge` when the flow ran to a terminal state. A declined transfer is reported here with
/// `status == Failed`, not as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeResult {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub verified: bool,
    pub amount: Money,
    pub payer: Option<AccountId>,
    /// Present when the principal transfer settled.
    pub split: Option<FeeSplit>,
    /// `None` when the fee leg was never reached.
    pub fee_leg: Option<BestEffortTransfer>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundResult {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub amount: Money,
    pub fee_leg: BestEffortTransfer,
}

/// Aggregate figures over settled payments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformBalance {
    pub total_fees: Money,
    pub total_volume: Money,
    pub transaction_count: u64,
    /// Zero when there are no transactions.
    pub average_transaction: Money,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

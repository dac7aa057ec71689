use std::{fmt::Display, str::FromStr};

pub use biopay_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------      AccountId       ---------------------------------------------------------
/// Users and merchants share a single id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct AccountId(pub i64);

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

//--------------------------------------     AccountKind      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum AccountKind {
    /// An end user who pays with their face.
    User,
    /// A merchant who receives payments.
    Merchant,
}

impl Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountKind::User => write!(f, "User"),
            AccountKind::Merchant => write!(f, "Merchant"),
        }
    }
}

//--------------------------------------        Account       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub kind: AccountKind,
    pub display_name: String,
    /// True while the account has at least one active settlement token.
    pub funding_ready: bool,
    pub face_enrolled: bool,
    pub face_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Renders the account the way the audit relay identifies parties, e.g. `user_42` or `merchant_7`.
    pub fn audit_id(&self) -> String {
        match self.kind {
            AccountKind::User => format!("user_{}", self.id),
            AccountKind::Merchant => format!("merchant_{}", self.id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Leave empty to let the database assign the next id.
    pub id: Option<AccountId>,
    pub kind: AccountKind,
    pub display_name: String,
}

impl NewAccount {
    pub fn user<S: Into<String>>(display_name: S) -> Self {
        Self { id: None, kind: AccountKind::User, display_name: display_name.into() }
    }

    pub fn merchant<S: Into<String>>(display_name: S) -> Self {
        Self { id: None, kind: AccountKind::Merchant, display_name: display_name.into() }
    }

    pub fn with_id(mut self, id: AccountId) -> Self {
        self.id = Some(id);
        self
    }
}

//--------------------------------------    TransactionId     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TransactionId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConversionError("Transaction id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------  TransactionStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Created by the merchant; the payer is not yet known.
    Pending,
    /// The payer has been identified and money is about to move.
    Processing,
    /// The principal transfer settled.
    Completed,
    /// Identification, readiness checks or the principal transfer failed. Terminal.
    Failed,
    /// Abandoned before verification, by request or by expiry. Terminal.
    Cancelled,
    /// The principal transfer was reversed. Terminal.
    Refunded,
}

impl TransactionStatus {
    /// The allowed edges of the payment state machine. Nothing ever returns to `Pending`.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing | Failed | Cancelled) | (Processing, Completed | Failed) | (Completed, Refunded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Refunded)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Processing => write!(f, "Processing"),
            TransactionStatus::Completed => write!(f, "Completed"),
            TransactionStatus::Failed => write!(f, "Failed"),
            TransactionStatus::Cancelled => write!(f, "Cancelled"),
            TransactionStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

//--------------------------------------   TransactionKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionKind {
    Payment,
    Refund,
    Adjustment,
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Payment => write!(f, "Payment"),
            TransactionKind::Refund => write!(f, "Refund"),
            TransactionKind::Adjustment => write!(f, "Adjustment"),
        }
    }
}

//--------------------------------------     PaymentState     ---------------------------------------------------------
/// The status of a transaction together with the data that only exists in that status.
///
/// The payer is unknown while a transaction is `Pending` and becomes known once the identity service resolves the
/// biometric sample. Carrying it inside the variants means it cannot be read before identification has happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum PaymentState {
    Pending,
    Processing { payer: AccountId },
    Completed { payer: AccountId, completed_at: DateTime<Utc> },
    /// `payer` is `None` when the failure happened before the payer was attached to the transaction.
    Failed { payer: Option<AccountId>, reason: String },
    Cancelled { reason: String },
    Refunded { payer: AccountId, completed_at: DateTime<Utc>, note: String },
}

impl PaymentState {
    pub fn status(&self) -> TransactionStatus {
        match self {
            PaymentState::Pending => TransactionStatus::Pending,
            PaymentState::Processing { .. } => TransactionStatus::Processing,
            PaymentState::Completed { .. } => TransactionStatus::Completed,
            PaymentState::Failed { .. } => TransactionStatus::Failed,
            PaymentState::Cancelled { .. } => TransactionStatus::Cancelled,
            PaymentState::Refunded { .. } => TransactionStatus::Refunded,
        }
    }

    pub fn payer(&self) -> Option<AccountId> {
        match self {
            PaymentState::Pending | PaymentState::Cancelled { .. } => None,
            PaymentState::Processing { payer } |
            PaymentState::Completed { payer, .. } |
            PaymentState::Refunded { payer, .. } => Some(*payer),
            PaymentState::Failed { payer, .. } => *payer,
        }
    }

    /// The biometric check has passed exactly when a payer is attached.
    pub fn biometric_verified(&self) -> bool {
        self.payer().is_some()
    }

    /// The free-text reason stored alongside `Failed`, `Cancelled` and `Refunded` transactions.
    pub fn reason(&self) -> Option<&str> {
        match self {
            PaymentState::Failed { reason, .. } | PaymentState::Cancelled { reason } => Some(reason.as_str()),
            PaymentState::Refunded { note, .. } => Some(note.as_str()),
            _ => None,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            PaymentState::Completed { completed_at, .. } | PaymentState::Refunded { completed_at, .. } => {
                Some(*completed_at)
            },
            _ => None,
        }
    }
}

//--------------------------------------    TransactionRow    ---------------------------------------------------------
/// A row of the `transactions` table, exactly as stored.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub transaction_id: TransactionId,
    pub payer_id: Option<AccountId>,
    pub payee_id: AccountId,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    pub kind: TransactionKind,
    pub description: Option<String>,
    pub biometric_verified: bool,
    pub failure_reason: Option<String>,
    pub ledger_reference: Option<String>,
    pub platform_fee: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

//--------------------------------------     Transaction      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub transaction_id: TransactionId,
    pub payee: AccountId,
    pub amount: Money,
    pub currency: String,
    pub kind: TransactionKind,
    pub description: Option<String>,
    /// The banking system's reference for the principal transfer, once it has settled.
    pub ledger_reference: Option<String>,
    /// The platform fee collected when the payment completed. Zero if the fee leg did not settle.
    pub platform_fee: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: PaymentState,
}

impl Transaction {
    pub fn status(&self) -> TransactionStatus {
        self.state.status()
    }

    pub fn payer(&self) -> Option<AccountId> {
        self.state.payer()
    }

    pub fn biometric_verified(&self) -> bool {
        self.state.biometric_verified()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.state.reason()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.state.completed_at()
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = ConversionError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| ConversionError(format!("Transaction {} {what}", row.transaction_id));
        if !row.amount.is_positive() {
            return Err(corrupt("has a non-positive amount"));
        }
        if row.biometric_verified != row.payer_id.is_some() {
            return Err(corrupt("has a verification flag that disagrees with its payer"));
        }
        let reason = row.failure_reason.clone().unwrap_or_default();
        let state = match (row.status, row.payer_id, row.completed_at) {
            (TransactionStatus::Pending, None, None) => PaymentState::Pending,
            (TransactionStatus::Processing, Some(payer), None) => PaymentState::Processing { payer },
            (TransactionStatus::Completed, Some(payer), Some(completed_at)) => {
                PaymentState::Completed { payer, completed_at }
            },
            (TransactionStatus::Failed, payer, None) => PaymentState::Failed { payer, reason },
            (TransactionStatus::Cancelled, None, None) => PaymentState::Cancelled { reason },
            (TransactionStatus::Refunded, Some(payer), Some(completed_at)) => {
                PaymentState::Refunded { payer, completed_at, note: reason }
            },
            (status, payer, completed_at) => {
                return Err(corrupt(&format!(
                    "is {status} with payer {payer:?} and completion time {completed_at:?}, which is not a valid \
                     combination"
                )))
            },
        };
        Ok(Self {
            id: row.id,
            transaction_id: row.transaction_id,
            payee: row.payee_id,
            amount: row.amount,
            currency: row.currency,
            kind: row.kind,
            description: row.description,
            ledger_reference: row.ledger_reference,
            platform_fee: row.platform_fee,
            created_at: row.created_at,
            updated_at: row.updated_at,
            state,
        })
    }
}

//--------------------------------------      Settlement      ---------------------------------------------------------
/// What is recorded alongside a completed payment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    /// The banking system's reference for the principal transfer.
    pub ledger_reference: Option<String>,
    /// The platform fee that reached the platform token.
    pub platform_fee: Money,
}

//--------------------------------------    NewTransaction    ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_id: TransactionId,
    pub payee: AccountId,
    pub amount: Money,
    pub currency: String,
    pub kind: TransactionKind,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// A new pending payment to `payee` with a freshly generated transaction id.
    pub fn payment(payee: AccountId, amount: Money, currency: &str) -> Self {
        Self {
            transaction_id: TransactionId::random(),
            payee,
            amount,
            currency: currency.to_string(),
            kind: TransactionKind::Payment,
            description: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

//--------------------------------------       TokenId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TokenId(pub i64);

impl Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     PaymentToken     ---------------------------------------------------------
/// An opaque credential issued by the banking system. Only the last four characters are ever displayed.
#[derive(Clone, PartialEq, Eq, Hash, Type)]
#[sqlx(transparent)]
pub struct PaymentToken(String);

impl PaymentToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    /// The raw token, for sending to the banking system.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl Display for PaymentToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.0.chars().count();
        let tail: String = self.0.chars().skip(len.saturating_sub(4)).collect();
        write!(f, "****{tail}")
    }
}

impl std::fmt::Debug for PaymentToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentToken({self})")
    }
}

//--------------------------------------   SettlementToken    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SettlementToken {
    pub id: TokenId,
    pub account_id: AccountId,
    pub token: PaymentToken,
    pub card_last4: Option<String>,
    pub nickname: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewSettlementToken {
    pub token: PaymentToken,
    pub card_last4: Option<String>,
    pub nickname: Option<String>,
    /// Make this the account's default even if another default exists.
    pub make_default: bool,
}

impl NewSettlementToken {
    pub fn new(token: PaymentToken) -> Self {
        Self { token, card_last4: None, nickname: None, make_default: false }
    }

    pub fn with_card_last4<S: Into<String>>(mut self, last4: S) -> Self {
        self.card_last4 = Some(last4.into());
        self
    }

    pub fn with_nickname<S: Into<String>>(mut self, nickname: S) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.make_default = true;
        self
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn row(status: TransactionStatus, payer: Option<i64>, completed: bool) -> TransactionRow {
        let now = Utc::now();
        TransactionRow {
            id: 1,
            transaction_id: TransactionId("tx-1".into()),
            payer_id: payer.map(AccountId),
            payee_id: AccountId(7),
            amount: Money::from(5000),
            currency: "USD".into(),
            status,
            kind: TransactionKind::Payment,
            description: None,
            biometric_verified: payer.is_some(),
            failure_reason: Some("reason".into()),
            ledger_reference: None,
            platform_fee: completed.then_some(Money::from(150)),
            created_at: now,
            updated_at: now,
            completed_at: completed.then_some(now),
        }
    }

    #[test]
    fn rows_convert_to_states() {
        let tx = Transaction::try_from(row(TransactionStatus::Pending, None, false)).unwrap();
        assert_eq!(tx.state, PaymentState::Pending);
        assert!(!tx.biometric_verified());

        let tx = Transaction::try_from(row(TransactionStatus::Completed, Some(42), true)).unwrap();
        assert_eq!(tx.payer(), Some(AccountId(42)));
        assert!(tx.biometric_verified());
        assert!(tx.completed_at().is_some());

        let tx = Transaction::try_from(row(TransactionStatus::Failed, None, false)).unwrap();
        assert_eq!(tx.failure_reason(), Some("reason"));
        assert_eq!(tx.payer(), None);

        let tx = Transaction::try_from(row(TransactionStatus::Refunded, Some(42), true)).unwrap();
        assert_eq!(tx.failure_reason(), Some("reason"));
    }

    #[test]
    fn invalid_rows_are_rejected() {
        assert!(Transaction::try_from(row(TransactionStatus::Pending, Some(42), false)).is_err());
        assert!(Transaction::try_from(row(TransactionStatus::Completed, Some(42), false)).is_err());
        assert!(Transaction::try_from(row(TransactionStatus::Processing, None, false)).is_err());
        let mut bad = row(TransactionStatus::Processing, Some(42), false);
        bad.biometric_verified = false;
        assert!(Transaction::try_from(bad).is_err());
        let mut bad = row(TransactionStatus::Pending, None, false);
        bad.amount = Money::from(0);
        assert!(Transaction::try_from(bad).is_err());
    }

    #[test]
    fn state_machine_edges() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Refunded));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Refunded.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Refunded.is_terminal());
        assert!(!Completed.is_terminal());
    }

    #[test]
    fn payment_tokens_are_masked() {
        let token = PaymentToken::new("tok_live_abcdef1234");
        assert_eq!(token.to_string(), "****1234");
        assert_eq!(format!("{token:?}"), "PaymentToken(****1234)");
        assert_eq!(token.reveal(), "tok_live_abcdef1234");
    }

    #[test]
    fn audit_ids() {
        let now = Utc::now();
        let mut account = Account {
            id: AccountId(42),
            kind: AccountKind::User,
            display_name: "Ada".into(),
            funding_ready: true,
            face_enrolled: true,
            face_id: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(account.audit_id(), "user_42");
        account.kind = AccountKind::Merchant;
        assert_eq!(account.audit_id(), "merchant_42");
    }
}

use std::fmt::{Debug, Display};

use biopay_common::Secret;
use thiserror::Error;

use crate::db_types::{AccountId, Money, PaymentToken};

//--------------------------------------     LedgerGateway     --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub sender: PaymentToken,
    pub receiver: PaymentToken,
    pub amount: Money,
    pub description: String,
}

impl Display for TransferRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} from {} to {} ({})", self.amount, self.sender, self.receiver, self.description)
    }
}

/// Proof that the banking system accepted a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReceipt {
    /// The banking system's own id for the transfer, when it supplies one.
    pub reference: Option<String>,
}

#[derive(Clone)]
pub struct CardDetails {
    pub card_number: Secret<String>,
    pub cvv: Secret<String>,
    /// `MM/YY`
    pub expiry: String,
}

impl CardDetails {
    pub fn last4(&self) -> String {
        let digits: Vec<char> = self.card_number.reveal().chars().filter(|c| c.is_ascii_digit()).collect();
        digits[digits.len().saturating_sub(4)..].iter().collect()
    }
}

impl Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CardDetails(****{}, expires {})", self.last4(), self.expiry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCard {
    pub token: PaymentToken,
    pub card_last4: String,
}

/// The banking system. Implementations never raise: any failure (declines, timeouts, malformed responses) is
/// reported as `None`, and the engine decides what that failure means.
#[allow(async_fn_in_trait)]
pub trait LedgerGateway {
    /// Moves `amount` from the sender's funding instrument to the receiver's.
    async fn transfer(&self, request: &TransferRequest) -> Option<TransferReceipt>;

    /// Checks the card with the issuer and, if it is valid, returns a settlement token for it.
    async fn verify_card(&self, card: &CardDetails) -> Option<VerifiedCard>;
}

//--------------------------------------    IdentityGateway    --------------------------------------------------------
/// A base64-encoded face image.
#[derive(Clone, PartialEq, Eq)]
pub struct BiometricSample(String);

impl BiometricSample {
    pub fn new<S: Into<String>>(image_base64: S) -> Self {
        Self(image_base64.into())
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }
}

impl Debug for BiometricSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BiometricSample({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone, Error)]
pub enum IdentityGatewayError {
    #[error("Could not reach the biometric service. {0}")]
    Unavailable(String),
    #[error("The biometric service returned an unexpected response. {0}")]
    InvalidResponse(String),
}

/// The biometric identity service.
#[allow(async_fn_in_trait)]
pub trait IdentityGateway {
    /// Resolves the sample to the best-matching account, or `None` if nobody matches.
    async fn search_face(&self, sample: &BiometricSample) -> Result<Option<AccountId>, IdentityGatewayError>;

    /// Associates an enrolled face with an account.
    async fn link_face(&self, account: AccountId, face_id: &str) -> Result<bool, IdentityGatewayError>;

    /// Removes all biometric data for the account.
    async fn delete_face(&self, account: AccountId) -> Result<bool, IdentityGatewayError>;
}

//! # Backend contracts of the payment engine.
//!
//! The orchestrator never talks to a database or an HTTP service directly. It is generic over the traits in this
//! module, and concrete backends (the [`crate::SqliteDatabase`], the HTTP clients in `biopay_gateways`, or test
//! doubles) implement them.
//!
//! ## Storage
//! * [`TransactionLedger`] is the durable record of every payment and its state. Every status write is a
//!   compare-and-set on the expected prior status.
//! * [`PaymentTokenStore`] maps accounts to their settlement tokens and guarantees at most one default token per
//!   account.
//! * [`AccountDirectory`] is the minimal account surface needed to decide whether a payer or payee is ready to
//!   transact.
//!
//! ## External systems
//! * [`LedgerGateway`] moves money between settlement tokens and verifies cards.
//! * [`IdentityGateway`] resolves biometric samples to accounts.
mod account_directory;
mod data_objects;
mod gateways;
mod token_store;
mod transaction_ledger;

pub use account_directory::{AccountDirectory, AccountDirectoryError};
pub use data_objects::RetiredToken;
pub use gateways::{
    BiometricSample,
    CardDetails,
    IdentityGateway,
    IdentityGatewayError,
    LedgerGateway,
    TransferReceipt,
    TransferRequest,
    VerifiedCard,
};
pub use token_store::{PaymentTokenStore, TokenStoreError};
pub use transaction_ledger::{TransactionLedger, TransactionLedgerError};

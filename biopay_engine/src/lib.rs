//! BioPay Engine
//!
//! The BioPay engine processes payments that a user authorises with their face. A merchant opens a payment session,
//! the user presents a biometric sample, and the engine identifies the payer, moves the money between the parties'
//! settlement tokens, takes the platform fee and hands two audit records to the audit relay.
//!
//! The library is divided into the following sections:
//! 1. Storage ([`mod@sqlite`]). SQLite is the supported backend. You should not need to access the database directly.
//!    Use the public API instead. The data types stored in the database are defined in [`mod@db_types`] and are public.
//! 2. The backend and gateway traits ([`mod@traits`]). Anything that implements them can act as a storage backend or
//!    stand in for the banking and biometric services.
//! 3. The public API: [`PaymentFlowApi`], [`TokenApi`], [`AccountApi`] and [`PlatformApi`].
//!
//! Completed payments emit [`events::AuditRecordEvent`]s. Delivery to the audit relay happens on its own task, so the
//! payment path never waits for it. Subscribe with [`events::EventHooks`].
pub mod db_types;
pub mod events;
pub mod traits;

mod bpe_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
mod expiry_worker;

#[cfg(feature = "sqlite")]
pub use expiry_worker::start_expiry_worker;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use bpe_api::{
    accounts_api::AccountApi,
    config,
    errors::{AccountApiError, PaymentFlowError, TokenApiError},
    payment_flow_api::PaymentFlowApi,
    payment_objects,
    platform_api::PlatformApi,
    token_api::TokenApi,
    transaction_objects,
};

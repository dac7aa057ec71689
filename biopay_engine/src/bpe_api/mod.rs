//! # BioPay engine public API
//!
//! The `bpe_api` module exposes the programmatic API for the BioPay engine. The API is modular, so that clients can
//! pick the functionality they need.
//!
//! * [`payment_flow_api`] is the primary API. It initiates payments, identifies the payer, settles, splits the fee,
//!   refunds and expires abandoned payment sessions.
//! * [`token_api`] links, lists and retires the settlement tokens that stand in for payment cards.
//! * [`accounts_api`] creates accounts, fetches transaction histories and manages biometric enrolment.
//! * [`platform_api`] reports on the fees the platform has earned.
//!
//! The other submodules are support types.
//!
//! # API usage
//!
//! Every API is created from a database backend that implements the traits it needs, plus whichever gateways it
//! talks to.
//!
//! ```rust,ignore
//! use biopay_engine::{PaymentFlowApi, SqliteDatabase, config::PaymentFlowConfig, events::EventProducers};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = PaymentFlowApi::new(db, banking, biometric, EventProducers::default(), PaymentFlowConfig::default());
//! let payment = api.initiate(NewPaymentRequest::new(merchant, Money::from_major(50), "USD")).await?;
//! let result = api.verify_and_charge(&payment.transaction_id, &sample).await?;
//! ```

pub mod accounts_api;
pub mod config;
pub mod errors;
pub mod payment_flow_api;
pub mod payment_objects;
pub mod platform_api;
pub mod token_api;
pub mod transaction_objects;

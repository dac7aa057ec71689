//! HTTP clients for the services the BioPay engine depends on.
//!
//! * [`BankingClient`] implements the engine's `LedgerGateway` over the banking system's external API.
//! * [`BiometricClient`] implements the engine's `IdentityGateway` over the biometric identity service.
//! * [`AuditRelayClient`] records settled money movements on the audit relay, with retries decided by
//!   [`retry::RetryPolicy`]. [`audit_event_hooks`] connects it to the engine's audit events.
//!
//! Each client is configured from the environment with the `from_env_or_default` constructors in [`config`].
mod audit;
mod banking;
mod biometric;
pub mod config;
pub mod data_objects;
mod error;
mod http;
pub mod retry;

pub use audit::{audit_event_hooks, audit_relay_hook, AuditOutcome, AuditRelayClient};
pub use banking::BankingClient;
pub use biometric::BiometricClient;
pub use error::{GatewayError, RelayError};

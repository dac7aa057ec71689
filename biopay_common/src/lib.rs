//! Value types shared by the BioPay engine and its gateway clients.
//!
//! * [`Money`] is a fixed-point amount in minor currency units (cents). All arithmetic on money in the engine goes
//!   through this type, so rounding only ever happens in one place ([`Money::basis_points`]).
//! * [`Secret`] wraps credentials (settlement tokens, card numbers) so they never leak into logs.
mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::{parse_boolean_flag, parse_number};
pub use money::{Money, MoneyConversionError, BASIS_POINTS_DIVISOR, DEFAULT_CURRENCY_CODE, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;

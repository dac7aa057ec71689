//! When to try an audit relay delivery again.
//!
//! The policy is a pure function of the attempt number and the error, so the delivery loop in
//! [`crate::AuditRelayClient::record_with_retry`] holds no retry logic of its own.
use std::time::Duration;

use crate::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    RetryAfter(Duration),
    /// The relay already holds this record. Stop, without error.
    AlreadyRecorded,
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// The wait after the first failure. Each further failure doubles it.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// `attempt` is the 1-based number of the attempt that just failed with `error`.
    pub fn decide(&self, attempt: u32, error: &RelayError) -> RetryDecision {
        if error.is_conflict() {
            return RetryDecision::AlreadyRecorded;
        }
        if matches!(error, RelayError::Disabled) || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        RetryDecision::RetryAfter(self.base_delay.saturating_mul(factor))
    }
}

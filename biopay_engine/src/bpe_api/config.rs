use std::{env, time::Duration};

use biopay_common::parse_number;
use log::*;

use crate::{bpe_api::payment_objects::PLATFORM_FEE_BPS, db_types::PaymentToken};

const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_PENDING_TIMEOUT_MINS: i64 = 15;

#[derive(Clone, Debug)]
pub struct PaymentFlowConfig {
    /// The settlement token that collects platform fees. When it is missing, fee legs are skipped.
    pub platform_token: Option<PaymentToken>,
    /// Upper bound on a single ledger transfer. Exceeding it counts as a decline.
    pub transfer_timeout: Duration,
    pub platform_fee_bps: i64,
    /// Pending transactions older than this are cancelled by the expiry worker.
    pub pending_timeout: chrono::Duration,
}

impl Default for PaymentFlowConfig {
    fn default() -> Self {
        Self {
            platform_token: None,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            platform_fee_bps: PLATFORM_FEE_BPS,
            pending_timeout: chrono::Duration::minutes(DEFAULT_PENDING_TIMEOUT_MINS),
        }
    }
}

impl PaymentFlowConfig {
    pub fn from_env_or_default() -> Self {
        let platform_token = env::var("BIOPAY_PLATFORM_PAYMENT_TOKEN").ok().filter(|s| !s.trim().is_empty());
        if platform_token.is_none() {
            warn!(
                "🪛️ BIOPAY_PLATFORM_PAYMENT_TOKEN is not set. Platform fees will NOT be collected until it is set to \
                 the platform's settlement token."
            );
        }
        let timeout_ms = parse_number(
            env::var("BIOPAY_TRANSFER_TIMEOUT_MS").ok(),
            u64::try_from(DEFAULT_TRANSFER_TIMEOUT.as_millis()).unwrap_or(5_000),
        );
        let pending_mins = parse_number(env::var("BIOPAY_PENDING_TIMEOUT_MINS").ok(), DEFAULT_PENDING_TIMEOUT_MINS);
        if pending_mins <= 0 {
            warn!("🪛️ BIOPAY_PENDING_TIMEOUT_MINS must be positive. Using {DEFAULT_PENDING_TIMEOUT_MINS} minutes.");
        }
        let pending_mins = if pending_mins > 0 { pending_mins } else { DEFAULT_PENDING_TIMEOUT_MINS };
        info!("🪛️ Ledger transfers time out after {timeout_ms}ms. Pending payments expire after {pending_mins} minutes.");
        Self {
            platform_token: platform_token.map(PaymentToken::new),
            transfer_timeout: Duration::from_millis(timeout_ms),
            platform_fee_bps: PLATFORM_FEE_BPS,
            pending_timeout: chrono::Duration::minutes(pending_mins),
        }
    }

    pub fn with_platform_token(mut self, token: PaymentToken) -> Self {
        self.platform_token = Some(token);
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }
}

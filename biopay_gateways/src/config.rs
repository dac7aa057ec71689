use std::{env, time::Duration};

use biopay_common::{parse_boolean_flag, parse_number};
use log::*;

use crate::retry::RetryPolicy;

const DEFAULT_BANKING_URL: &str = "http://localhost:5000";
const DEFAULT_BIOMETRIC_URL: &str = "http://localhost:8000";
const DEFAULT_AUDIT_RELAY_URL: &str = "http://localhost:3001";

fn url_from_env(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| {
        warn!("🪛️ {var} is not set. Using {default}");
        default.to_string()
    })
}

fn millis_from_env(var: &str, default: u64) -> Duration {
    Duration::from_millis(parse_number(env::var(var).ok(), default))
}

#[derive(Debug, Clone)]
pub struct BankingConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for BankingConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BANKING_URL.to_string(), timeout: Duration::from_millis(5_000) }
    }
}

impl BankingConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.to_string(), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let base_url = url_from_env("BIOPAY_BANKING_URL", DEFAULT_BANKING_URL);
        let timeout = millis_from_env("BIOPAY_BANKING_TIMEOUT_MS", 5_000);
        Self { base_url, timeout }
    }
}

#[derive(Debug, Clone)]
pub struct BiometricConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for BiometricConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BIOMETRIC_URL.to_string(), timeout: Duration::from_millis(10_000) }
    }
}

impl BiometricConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.to_string(), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let base_url = url_from_env("BIOPAY_BIOMETRIC_URL", DEFAULT_BIOMETRIC_URL);
        let timeout = millis_from_env("BIOPAY_BIOMETRIC_TIMEOUT_MS", 10_000);
        Self { base_url, timeout }
    }
}

#[derive(Debug, Clone)]
pub struct AuditRelayConfig {
    pub base_url: String,
    /// When false, records are dropped and the relay reports itself unhealthy.
    pub enabled: bool,
    /// Per request. Retries are governed by `retry`.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub queue_size: usize,
    pub max_jobs: u32,
}

impl Default for AuditRelayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AUDIT_RELAY_URL.to_string(),
            enabled: true,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            queue_size: 256,
            max_jobs: 8,
        }
    }
}

impl AuditRelayConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.to_string(), ..Default::default() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = url_from_env("BIOPAY_AUDIT_RELAY_URL", DEFAULT_AUDIT_RELAY_URL);
        let enabled = parse_boolean_flag(env::var("BIOPAY_AUDIT_ENABLED").ok(), true);
        if !enabled {
            warn!("🪛️ The audit relay is disabled. Completed payments will not be recorded.");
        }
        let queue_size = parse_number(env::var("BIOPAY_AUDIT_QUEUE_SIZE").ok(), defaults.queue_size);
        let max_jobs = parse_number(env::var("BIOPAY_AUDIT_MAX_JOBS").ok(), defaults.max_jobs);
        info!("🪛️ Audit relay at {base_url}. Queue size {queue_size}, {max_jobs} concurrent deliveries.");
        Self { base_url, enabled, queue_size, max_jobs, ..defaults }
    }
}

use std::{future::Future, pin::Pin, sync::Arc};

use biopay_engine::{
    db_types::{Money, TransactionId},
    events::{AuditParty, AuditRecordEvent, EventHooks, Handler},
};
use chrono::Utc;
use log::*;
use reqwest::Method;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{
    config::AuditRelayConfig,
    data_objects::{AuditReceipt, AuditRecord},
    http::JsonClient,
    retry::{RetryDecision, RetryPolicy},
    RelayError,
};

/// How a delivery to the audit relay ended. Never an error: audit delivery must not affect payments.
#[derive(Debug, Clone)]
pub enum AuditOutcome {
    Recorded(AuditReceipt),
    /// The relay already held the record (409 Conflict).
    AlreadyRecorded,
    Failed { attempts: u32, error: RelayError },
    Disabled,
}

impl AuditOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditOutcome::Recorded(_) | AuditOutcome::AlreadyRecorded)
    }
}

/// Client for the append-only audit relay.
#[derive(Clone)]
pub struct AuditRelayClient {
    http: JsonClient,
    enabled: bool,
    retry: RetryPolicy,
}

impl AuditRelayClient {
    pub fn new(config: AuditRelayConfig) -> Result<Self, crate::GatewayError> {
        let http = JsonClient::new(&config.base_url, config.timeout)?;
        info!("🧾️ Audit relay client created. Enabled: {}, relay URL: {}", config.enabled, config.base_url);
        Ok(Self { http, enabled: config.enabled, retry: config.retry })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A single delivery attempt.
    pub async fn record_transaction(&self, record: &AuditRecord) -> Result<AuditReceipt, RelayError> {
        if !self.enabled {
            return Err(RelayError::Disabled);
        }
        let receipt =
            self.http.json_query::<AuditReceipt, _>(Method::POST, "/record-transaction", Some(record)).await?;
        match receipt.status.to_ascii_lowercase().as_str() {
            "error" | "failed" | "failure" => Err(RelayError::Rejected(format!(
                "status={}. {}",
                receipt.status,
                receipt.message.as_deref().unwrap_or("no message")
            ))),
            _ => Ok(receipt),
        }
    }

    /// Delivers the record, retrying according to the configured [`RetryPolicy`].
    pub async fn record_with_retry(&self, record: &AuditRecord) -> AuditOutcome {
        if !self.enabled {
            debug!("🧾️ Audit relay is disabled. Record {} is dropped.", record.tx_id_offchain);
            return AuditOutcome::Disabled;
        }
        let id = &record.tx_id_offchain;
        let mut attempt = 1;
        loop {
            let error = match self.record_transaction(record).await {
                Ok(receipt) => {
                    let hash = receipt.data.as_ref().and_then(|d| d.blockchain_tx_hash.as_deref()).unwrap_or("N/A");
                    info!("🧾️ Audit record {id} stored. Tx hash: {hash}");
                    return AuditOutcome::Recorded(receipt);
                },
                Err(e) => e,
            };
            match self.retry.decide(attempt, &error) {
                RetryDecision::AlreadyRecorded => {
                    info!("🧾️ Audit record {id} was already stored");
                    return AuditOutcome::AlreadyRecorded;
                },
                RetryDecision::RetryAfter(delay) => {
                    warn!("🧾️ Audit record {id} failed on attempt {attempt}. Retrying in {delay:?}. {error}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                RetryDecision::GiveUp => {
                    error!("🧾️ Failed to store audit record {id} after {attempt} attempt(s). {error}");
                    return AuditOutcome::Failed { attempts: attempt, error };
                },
            }
        }
    }

    /// Fire and forget. The delivery runs on its own task.
    pub fn record_async(
        &self,
        transaction_id: &TransactionId,
        amount: Money,
        from: AuditParty,
        to: AuditParty,
    ) -> JoinHandle<AuditOutcome> {
        let record = AuditRecord {
            tx_id_offchain: transaction_id.to_string(),
            amount: amount.value(),
            timestamp: Utc::now().timestamp(),
            from_id: from.to_string(),
            to_id: to.to_string(),
        };
        let client = self.clone();
        tokio::spawn(async move { client.record_with_retry(&record).await })
    }

    pub async fn is_healthy(&self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.http.get_text("/health").await {
            Ok(body) => body.contains("\"status\":\"ok\""),
            Err(e) => {
                warn!("🧾️ Audit relay health check failed. {e}");
                false
            },
        }
    }

    pub async fn stats(&self) -> Result<Value, RelayError> {
        if !self.enabled {
            return Err(RelayError::Disabled);
        }
        let stats = self.http.json_query::<Value, ()>(Method::GET, "/stats", None).await?;
        Ok(stats)
    }
}

/// Event hooks that deliver audit records to the relay. Pass them to `EventHandlers::new` with the relay's queue size
/// and job limit.
pub fn audit_event_hooks(client: AuditRelayClient) -> EventHooks {
    EventHooks { on_audit_record: Some(audit_relay_hook(client)) }
}

/// An event hook that delivers every [`AuditRecordEvent`] to the relay.
pub fn audit_relay_hook(client: AuditRelayClient) -> Handler<AuditRecordEvent> {
    Arc::new(move |event: AuditRecordEvent| -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let client = client.clone();
        Box::pin(async move {
            let record = AuditRecord::from(&event);
            let outcome = client.record_with_retry(&record).await;
            trace!("🧾️ Audit hook finished for {}: {outcome:?}", record.tx_id_offchain);
        })
    })
}

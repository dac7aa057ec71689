use std::time::Duration;

use biopay_common::Money;
use biopay_engine::{
    db_types::{AccountId, TransactionId},
    events::{AuditParty, AuditRecordEvent, EventHandlers},
};
use biopay_gateways::{
    audit_event_hooks,
    config::AuditRelayConfig,
    data_objects::AuditRecord,
    retry::RetryPolicy,
    AuditOutcome,
    AuditRelayClient,
    RelayError,
};
use chrono::Utc;
use mockito::Matcher;
use serde_json::json;

fn client(server: &mockito::Server) -> AuditRelayClient {
    let _ = env_logger::try_init();
    let config = AuditRelayConfig::new(&server.url()).with_retry(RetryPolicy::new(3, Duration::from_millis(10)));
    AuditRelayClient::new(config).expect("Error creating client")
}

fn record() -> AuditRecord {
    AuditRecord {
        tx_id_offchain: "tx-1".into(),
        amount: 4850,
        timestamp: 1_700_000_000,
        from_id: "user_42".into(),
        to_id: "merchant_7".into(),
    }
}

const RECEIPT: &str = r#"{"status":"success","message":"Recorded","data":{"txIdOffchain":"tx-1","blockchainTxHash":"0xabc","blockNumber":12}}"#;

#[tokio::test]
async fn records_transaction() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/record-transaction")
        .match_body(Matcher::Json(json!({
            "txIdOffchain": "tx-1",
            "amount": 4850,
            "timestamp": 1_700_000_000,
            "fromId": "user_42",
            "toId": "merchant_7"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(RECEIPT)
        .expect(1)
        .create_async()
        .await;
    let outcome = client(&server).record_with_retry(&record()).await;
    match outcome {
        AuditOutcome::Recorded(receipt) => {
            let data = receipt.data.expect("Receipt has data");
            assert_eq!(data.blockchain_tx_hash.as_deref(), Some("0xabc"));
            assert_eq!(data.block_number, Some(12));
        },
        other => panic!("Unexpected outcome: {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn retries_three_times_then_gives_up() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/record-transaction").with_status(503).expect(3).create_async().await;
    let outcome = client(&server).record_with_retry(&record()).await;
    assert!(matches!(outcome, AuditOutcome::Failed { attempts: 3, error: RelayError::Gateway(_) }));
    assert!(!outcome.is_recorded());
    mock.assert_async().await;
}

#[tokio::test]
async fn conflict_stops_retrying() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/record-transaction")
        .with_status(409)
        .with_body(r#"{"status":"error","message":"Transaction already recorded"}"#)
        .expect(1)
        .create_async()
        .await;
    let outcome = client(&server).record_with_retry(&record()).await;
    assert!(matches!(outcome, AuditOutcome::AlreadyRecorded));
    assert!(outcome.is_recorded());
    mock.assert_async().await;
}

#[tokio::test]
async fn disabled_relay_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/record-transaction").expect(0).create_async().await;
    let health = server.mock("GET", "/health").expect(0).create_async().await;
    let config = AuditRelayConfig::new(&server.url()).disabled();
    let client = AuditRelayClient::new(config).unwrap();
    assert!(matches!(client.record_with_retry(&record()).await, AuditOutcome::Disabled));
    assert!(!client.is_healthy().await);
    assert!(matches!(client.stats().await, Err(RelayError::Disabled)));
    mock.assert_async().await;
    health.assert_async().await;
}

#[tokio::test]
async fn health_and_stats() {
    let mut server = mockito::Server::new_async().await;
    let _health = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body(r#"{"status":"ok","network":"sepolia"}"#)
        .create_async()
        .await;
    let _stats = server
        .mock("GET", "/stats")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"totalRecords":12,"latestBlock":99}"#)
        .create_async()
        .await;
    let client = client(&server);
    assert!(client.is_healthy().await);
    let stats = client.stats().await.expect("Error fetching stats");
    assert_eq!(stats["totalRecords"], 12);

    let mut down = mockito::Server::new_async().await;
    let _health = down.mock("GET", "/health").with_status(200).with_body(r#"{"status":"degraded"}"#).create_async().await;
    assert!(!self::client(&down).is_healthy().await);
}

#[tokio::test]
async fn record_async_runs_in_background() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/record-transaction")
        .match_body(Matcher::PartialJson(json!({"txIdOffchain": "tx-9_FEE", "amount": 150, "toId": "platform"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(RECEIPT)
        .create_async()
        .await;
    let tx = TransactionId::from("tx-9_FEE".to_string());
    let handle =
        client(&server).record_async(&tx, Money::from(150), AuditParty::Merchant(AccountId(7)), AuditParty::Platform);
    let outcome = handle.await.expect("Delivery task panicked");
    assert!(outcome.is_recorded());
    mock.assert_async().await;
}

#[tokio::test]
async fn audit_events_are_delivered_by_the_hook() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/record-transaction")
        .match_body(Matcher::PartialJson(json!({"fromId": "user_42", "toId": "merchant_7", "amount": 4850})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(RECEIPT)
        .expect(1)
        .create_async()
        .await;
    let handlers = EventHandlers::new(8, 2, audit_event_hooks(client(&server)));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let tx = TransactionId::from("tx-1".to_string());
    let event = AuditRecordEvent::merchant_leg(&tx, AccountId(42), AccountId(7), Money::from(4850), Utc::now());
    assert_eq!(producers.publish_audit_record(event), 1);
    for _ in 0..100 {
        if mock.matched_async().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    mock.assert_async().await;
}

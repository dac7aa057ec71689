use std::time::Duration;

use biopay_engine::{
    config::PaymentFlowConfig,
    db_types::{Money, PaymentToken},
    events::EventProducers,
    payment_objects::NewPaymentRequest,
    traits::BiometricSample,
    PaymentFlowApi,
    PlatformApi,
};
use chrono::Utc;
use support::{
    fakes::{identity_matching, FakeLedger},
    prepare_env::{prepare_test_env, random_db_path, tear_down},
    seed_parties,
    MERCHANT,
    PLATFORM_TOKEN,
};

mod support;

#[tokio::test]
async fn platform_balance_counts_completed_payments() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_parties(&db).await;
    let config = PaymentFlowConfig::default()
        .with_platform_token(PaymentToken::new(PLATFORM_TOKEN))
        .with_transfer_timeout(Duration::from_millis(500));
    let flow =
        PaymentFlowApi::new(db.clone(), FakeLedger::default(), identity_matching(42), EventProducers::default(), config);
    let platform = PlatformApi::new(db.clone());

    let empty = platform.platform_balance().await.unwrap();
    assert_eq!(empty.transaction_count, 0);
    assert_eq!(empty.total_fees, Money::from(0));
    assert_eq!(empty.average_transaction, Money::from(0));

    let sample = BiometricSample::new("ZmFjZQ==");
    let start = Utc::now() - chrono::Duration::minutes(1);
    for major in [100, 50, 20] {
        let request = NewPaymentRequest::new(MERCHANT, Money::from_major(major), "USD");
        let id = flow.initiate(request).await.unwrap().transaction_id;
        flow.verify_and_charge(&id, &sample).await.unwrap();
        if major == 20 {
            flow.refund(&id, "returned").await.unwrap();
        }
    }
    // Never verified
    flow.initiate(NewPaymentRequest::new(MERCHANT, Money::from_major(1000), "USD")).await.unwrap();

    let balance = platform.platform_balance().await.unwrap();
    assert_eq!(balance.transaction_count, 2);
    assert_eq!(balance.total_volume, Money::from_major(150));
    assert_eq!(balance.total_fees, Money::from(450));
    assert_eq!(balance.average_transaction, Money::from_major(75));
    assert!(balance.since.is_none());

    let end = Utc::now() + chrono::Duration::minutes(1);
    let summary = platform.fee_summary(start, end).await.unwrap();
    assert_eq!(summary.total_fees, Money::from(450));
    assert_eq!(summary.since, Some(start));
    assert_eq!(summary.until, Some(end));

    let later = platform.fee_summary(end, end + chrono::Duration::hours(1)).await.unwrap();
    assert_eq!(later.transaction_count, 0);
    assert_eq!(later.total_fees, Money::from(0));
    tear_down(db).await;
}

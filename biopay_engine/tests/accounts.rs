use std::time::Duration;

use biopay_engine::{
    config::PaymentFlowConfig,
    db_types::{AccountId, AccountKind, Money, NewAccount},
    events::EventProducers,
    payment_objects::NewPaymentRequest,
    traits::{AccountDirectory, BiometricSample, IdentityGatewayError},
    AccountApi,
    AccountApiError,
    PaymentFlowApi,
};
use mockall::predicate::eq;
use support::{
    fakes::{identity_matching, FakeLedger, MockIdentity},
    prepare_env::{prepare_test_env, random_db_path, tear_down},
    seed_parties,
    MERCHANT,
    USER,
};

mod support;

#[tokio::test]
async fn create_and_fetch_accounts() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = AccountApi::new(db.clone(), MockIdentity::new());
    let merchant = api.create_account(NewAccount::merchant("Corner Cafe")).await.expect("Error creating account");
    assert_eq!(merchant.kind, AccountKind::Merchant);
    assert!(!merchant.funding_ready);
    assert!(!merchant.face_enrolled);
    assert_eq!(merchant.audit_id(), format!("merchant_{}", merchant.id));
    let fetched = api.account(merchant.id).await.unwrap().expect("Account should exist");
    assert_eq!(fetched, merchant);
    assert!(api.account(AccountId(999)).await.unwrap().is_none());

    let user = api.create_account(NewAccount::user("Alice").with_id(AccountId(42))).await.unwrap();
    assert_eq!(user.id, AccountId(42));
    let err = api.create_account(NewAccount::user("Impostor").with_id(AccountId(42))).await.expect_err("Duplicate id");
    assert!(matches!(err, AccountApiError::AccountAlreadyExists(AccountId(42))));
    tear_down(db).await;
}

#[tokio::test]
async fn writes_are_visible_on_every_pooled_connection() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = AccountApi::new(db.clone(), MockIdentity::new());
    api.create_account(NewAccount::user("Dana").with_id(AccountId(5))).await.unwrap();
    db.set_face_enrolled(AccountId(5), Some("face-5")).await.unwrap();
    // Hold every connection at once so that most of them are not the one that did the writes
    let mut conns = Vec::new();
    for _ in 0..5 {
        conns.push(db.pool().acquire().await.expect("Error acquiring connection"));
    }
    for conn in conns.iter_mut() {
        let (enrolled,): (bool,) = sqlx::query_as("SELECT face_enrolled FROM accounts WHERE id = $1")
            .bind(5i64)
            .fetch_one(&mut **conn)
            .await
            .expect("Account 5 is not visible on this connection");
        assert!(enrolled);
    }
    drop(conns);
    let fetched = api.account(AccountId(5)).await.unwrap().expect("Account should exist");
    assert_eq!(fetched.face_id.as_deref(), Some("face-5"));
    tear_down(db).await;
}

#[tokio::test]
async fn enroll_and_remove_face() {
    let db = prepare_test_env(&random_db_path()).await;
    let mut identity = MockIdentity::new();
    identity.expect_link_face().with(eq(AccountId(42)), eq("face-42")).times(1).returning(|_, _| Ok(true));
    identity.expect_link_face().with(eq(AccountId(43)), eq("face-43")).times(1).returning(|_, _| Ok(false));
    identity.expect_delete_face().with(eq(AccountId(42))).times(1).returning(|_| Ok(true));
    identity
        .expect_delete_face()
        .with(eq(AccountId(43)))
        .times(1)
        .returning(|_| Err(IdentityGatewayError::Unavailable("timed out".into())));
    let api = AccountApi::new(db.clone(), identity);
    api.create_account(NewAccount::user("Alice").with_id(AccountId(42))).await.unwrap();
    api.create_account(NewAccount::user("Bob").with_id(AccountId(43))).await.unwrap();

    let alice = api.enroll_face(AccountId(42), "face-42").await.expect("Error enrolling face");
    assert!(alice.face_enrolled);
    assert_eq!(alice.face_id.as_deref(), Some("face-42"));

    let err = api.enroll_face(AccountId(43), "face-43").await.expect_err("Service refuses");
    assert!(matches!(err, AccountApiError::BiometricRequestRejected(AccountId(43))));
    assert!(!api.account(AccountId(43)).await.unwrap().unwrap().face_enrolled);

    let err = api.enroll_face(AccountId(999), "face-999").await.expect_err("Unknown account");
    assert!(matches!(err, AccountApiError::AccountNotFound(_)));

    let alice = api.remove_face(AccountId(42)).await.expect("Error removing face");
    assert!(!alice.face_enrolled);
    assert!(alice.face_id.is_none());

    let err = api.remove_face(AccountId(43)).await.expect_err("Service unavailable");
    assert!(matches!(err, AccountApiError::BiometricServiceError(_)));
    tear_down(db).await;
}

#[tokio::test]
async fn payment_and_sales_history() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_parties(&db).await;
    let config = PaymentFlowConfig::default().with_transfer_timeout(Duration::from_millis(500));
    let flow =
        PaymentFlowApi::new(db.clone(), FakeLedger::default(), identity_matching(42), EventProducers::default(), config);
    let paid = flow.initiate(NewPaymentRequest::new(MERCHANT, Money::from_major(12), "USD")).await.unwrap();
    flow.verify_and_charge(&paid.transaction_id, &BiometricSample::new("ZmFjZQ==")).await.unwrap();
    let open = flow.initiate(NewPaymentRequest::new(MERCHANT, Money::from_major(3), "USD")).await.unwrap();

    let api = AccountApi::new(db.clone(), MockIdentity::new());
    let payments = api.payment_history(USER).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].transaction_id, paid.transaction_id);
    let sales = api.sales_history(MERCHANT).await.unwrap();
    assert_eq!(sales.len(), 2);
    assert_eq!(sales[0].transaction_id, paid.transaction_id);
    assert_eq!(sales[1].transaction_id, open.transaction_id);
    assert!(api.payment_history(MERCHANT).await.unwrap().is_empty());
    tear_down(db).await;
}

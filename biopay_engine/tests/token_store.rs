use biopay_common::Secret;
use biopay_engine::{
    db_types::{AccountId, NewAccount, NewSettlementToken, PaymentToken, TokenId},
    traits::{AccountDirectory, CardDetails, PaymentTokenStore},
    SqliteDatabase,
    TokenApi,
    TokenApiError,
};
use support::{
    fakes::FakeLedger,
    prepare_env::{prepare_test_env, random_db_path, tear_down},
};

mod support;

const ALICE: AccountId = AccountId(42);

async fn setup() -> (TokenApi<SqliteDatabase, FakeLedger>, FakeLedger) {
    let db = prepare_test_env(&random_db_path()).await;
    db.create_account(NewAccount::user("Alice").with_id(ALICE)).await.expect("Error creating account");
    let ledger = FakeLedger::default();
    (TokenApi::new(db, ledger.clone()), ledger)
}

fn token(value: &str) -> NewSettlementToken {
    NewSettlementToken::new(PaymentToken::new(value))
}

fn card() -> CardDetails {
    CardDetails {
        card_number: Secret::new("4111111111111234".to_string()),
        cvv: Secret::new("123".to_string()),
        expiry: "12/29".to_string(),
    }
}

#[tokio::test]
async fn first_token_becomes_default() {
    let (api, _) = setup().await;
    let account = api.db().fetch_account(ALICE).await.unwrap().unwrap();
    assert!(!account.funding_ready);
    let err = api.default_token(ALICE).await.expect_err("No token yet");
    assert!(matches!(err, TokenApiError::NoDefaultToken(ALICE)));

    let first = api.link_token(ALICE, token("tok_a")).await.expect("Error linking token");
    assert!(first.is_default);
    assert!(first.is_active);
    let second = api.link_token(ALICE, token("tok_b").with_nickname("Travel card")).await.unwrap();
    assert!(!second.is_default);
    assert_eq!(second.nickname.as_deref(), Some("Travel card"));
    assert_eq!(api.default_token(ALICE).await.unwrap().id, first.id);

    let account = api.db().fetch_account(ALICE).await.unwrap().unwrap();
    assert!(account.funding_ready);
    let tokens = api.tokens(ALICE).await.unwrap();
    assert_eq!(tokens.iter().map(|t| t.id).collect::<Vec<_>>(), vec![first.id, second.id]);
    tear_down(api.db().clone()).await;
}

#[tokio::test]
async fn make_default_replaces_previous_default() {
    let (api, _) = setup().await;
    let first = api.link_token(ALICE, token("tok_a")).await.unwrap();
    let second = api.link_token(ALICE, token("tok_b").as_default()).await.unwrap();
    assert!(second.is_default);
    let tokens = api.tokens(ALICE).await.unwrap();
    let defaults = tokens.iter().filter(|t| t.is_default).count();
    assert_eq!(defaults, 1);
    assert_ne!(api.default_token(ALICE).await.unwrap().id, first.id);
    tear_down(api.db().clone()).await;
}

#[tokio::test]
async fn duplicate_token_is_rejected() {
    let (api, _) = setup().await;
    let bob = AccountId(43);
    api.db().create_account(NewAccount::user("Bob").with_id(bob)).await.unwrap();
    api.link_token(ALICE, token("tok_a")).await.unwrap();
    let err = api.link_token(ALICE, token("tok_a")).await.expect_err("Same token twice");
    assert!(matches!(err, TokenApiError::TokenAlreadyLinked(_)));
    let err = api.link_token(bob, token("tok_a")).await.expect_err("Same token on another account");
    assert!(matches!(err, TokenApiError::TokenAlreadyLinked(_)));
    let bob_account = api.db().fetch_account(bob).await.unwrap().unwrap();
    assert!(!bob_account.funding_ready);
    // Retired tokens are never linked again either
    let retired = api.default_token(ALICE).await.unwrap();
    api.retire(ALICE, retired.id).await.unwrap();
    let err = api.link_token(ALICE, token("tok_a")).await.expect_err("Retired token");
    assert!(matches!(err, TokenApiError::TokenAlreadyLinked(_)));
    tear_down(api.db().clone()).await;
}

#[tokio::test]
async fn link_token_to_unknown_account() {
    let (api, _) = setup().await;
    let err = api.link_token(AccountId(999), token("tok_z")).await.expect_err("Unknown account");
    assert!(matches!(err, TokenApiError::AccountNotFound(AccountId(999))));
    tear_down(api.db().clone()).await;
}

#[tokio::test]
async fn set_default_token() {
    let (api, _) = setup().await;
    let bob = AccountId(43);
    api.db().create_account(NewAccount::user("Bob").with_id(bob)).await.unwrap();
    let a = api.link_token(ALICE, token("tok_a")).await.unwrap();
    let b = api.link_token(ALICE, token("tok_b")).await.unwrap();
    let bobs = api.link_token(bob, token("tok_bob")).await.unwrap();

    let updated = api.set_default(ALICE, b.id).await.expect("Error setting default");
    assert!(updated.is_default);
    assert_eq!(api.default_token(ALICE).await.unwrap().id, b.id);
    let tokens = api.tokens(ALICE).await.unwrap();
    assert!(!tokens.iter().find(|t| t.id == a.id).unwrap().is_default);

    // Setting the current default again is a no-op
    let again = api.set_default(ALICE, b.id).await.unwrap();
    assert!(again.is_default);

    let err = api.set_default(ALICE, bobs.id).await.expect_err("Foreign token");
    assert!(matches!(err, TokenApiError::TokenNotFound { .. }));
    let err = api.set_default(ALICE, TokenId(9999)).await.expect_err("Unknown token");
    assert!(matches!(err, TokenApiError::TokenNotFound { .. }));

    api.retire(ALICE, a.id).await.unwrap();
    let err = api.set_default(ALICE, a.id).await.expect_err("Retired token");
    assert!(matches!(err, TokenApiError::TokenInactive(_)));
    assert_eq!(api.default_token(ALICE).await.unwrap().id, b.id);
    tear_down(api.db().clone()).await;
}

#[tokio::test]
async fn concurrent_set_default_keeps_one_default() {
    let (api, _) = setup().await;
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(api.link_token(ALICE, token(&format!("tok_{i}"))).await.unwrap().id);
    }
    let db = api.db().clone();
    let handles = (0..20)
        .map(|i| {
            let db = db.clone();
            let id = ids[i % ids.len()];
            tokio::spawn(async move { db.set_default_token(ALICE, id).await })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.await.expect("Task panicked").expect("Error setting default");
    }
    let tokens = api.tokens(ALICE).await.unwrap();
    assert_eq!(tokens.iter().filter(|t| t.is_default).count(), 1);
    tear_down(db).await;
}

#[tokio::test]
async fn retiring_default_promotes_oldest_remaining() {
    let (api, _) = setup().await;
    let a = api.link_token(ALICE, token("tok_a")).await.unwrap();
    let b = api.link_token(ALICE, token("tok_b")).await.unwrap();
    let c = api.link_token(ALICE, token("tok_c")).await.unwrap();

    let retired = api.retire(ALICE, a.id).await.expect("Error retiring token");
    assert!(!retired.retired.is_active);
    assert!(!retired.retired.is_default);
    assert_eq!(retired.promoted.map(|t| t.id), Some(b.id));
    assert!(retired.funding_ready);
    assert_eq!(api.default_token(ALICE).await.unwrap().id, b.id);

    // Retiring a non-default token promotes nothing
    let retired = api.retire(ALICE, c.id).await.unwrap();
    assert!(retired.promoted.is_none());
    assert_eq!(api.default_token(ALICE).await.unwrap().id, b.id);

    let err = api.retire(ALICE, c.id).await.expect_err("Already retired");
    assert!(matches!(err, TokenApiError::TokenInactive(_)));
    tear_down(api.db().clone()).await;
}

#[tokio::test]
async fn retiring_last_token_clears_funding_ready() {
    let (api, _) = setup().await;
    let a = api.link_token(ALICE, token("tok_a")).await.unwrap();
    let retired = api.retire(ALICE, a.id).await.unwrap();
    assert!(retired.promoted.is_none());
    assert!(!retired.funding_ready);
    let account = api.db().fetch_account(ALICE).await.unwrap().unwrap();
    assert!(!account.funding_ready);
    assert!(api.tokens(ALICE).await.unwrap().is_empty());
    assert!(matches!(api.default_token(ALICE).await, Err(TokenApiError::NoDefaultToken(_))));
    tear_down(api.db().clone()).await;
}

#[tokio::test]
async fn link_verified_card() {
    let (api, ledger) = setup().await;
    let err = api.link_card(ALICE, &card(), None, false).await.expect_err("Card is not accepted yet");
    assert!(matches!(err, TokenApiError::CardVerificationFailed));
    assert!(api.tokens(ALICE).await.unwrap().is_empty());

    ledger.accept_cards("tok_issued_1234", "1234");
    let linked = api.link_card(ALICE, &card(), Some("Everyday".into()), false).await.expect("Error linking card");
    assert_eq!(linked.token.reveal(), "tok_issued_1234");
    assert_eq!(linked.card_last4.as_deref(), Some("1234"));
    assert_eq!(linked.nickname.as_deref(), Some("Everyday"));
    assert!(linked.is_default);
    assert_eq!(ledger.card_checks(), 2);
    tear_down(api.db().clone()).await;
}

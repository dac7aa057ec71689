#![allow(dead_code)]

pub mod fakes;
pub mod prepare_env;

use biopay_engine::{
    db_types::{AccountId, NewAccount, NewSettlementToken, PaymentToken},
    traits::{AccountDirectory, PaymentTokenStore},
    SqliteDatabase,
};

pub const MERCHANT: AccountId = AccountId(7);
pub const USER: AccountId = AccountId(42);
pub const MERCHANT_TOKEN: &str = "tok_merchant_0007";
pub const USER_TOKEN: &str = "tok_user_0042";
pub const PLATFORM_TOKEN: &str = "tok_platform_0001";

/// Creates merchant #7 and user #42, each with a default settlement token. The user has an enrolled face.
pub async fn seed_parties(db: &SqliteDatabase) {
    db.create_account(NewAccount::merchant("Corner Cafe").with_id(MERCHANT)).await.expect("Error creating merchant");
    db.create_account(NewAccount::user("Alice").with_id(USER)).await.expect("Error creating user");
    db.link_token(MERCHANT, NewSettlementToken::new(PaymentToken::new(MERCHANT_TOKEN)).with_card_last4("0007"))
        .await
        .expect("Error linking merchant token");
    db.link_token(USER, NewSettlementToken::new(PaymentToken::new(USER_TOKEN)).with_card_last4("0042"))
        .await
        .expect("Error linking user token");
    db.set_face_enrolled(USER, Some("face-42")).await.expect("Error enrolling face");
}

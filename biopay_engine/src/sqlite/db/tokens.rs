use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{AccountId, NewSettlementToken, PaymentToken, SettlementToken, TokenId};

/// Fetches the token row by its value, whether or not it is still active.
pub async fn fetch_token_by_value(
    token: &PaymentToken,
    conn: &mut SqliteConnection,
) -> Result<Option<SettlementToken>, sqlx::Error> {
    let token =
        sqlx::query_as("SELECT * FROM settlement_tokens WHERE token = $1").bind(token.reveal()).fetch_optional(conn).await?;
    Ok(token)
}

/// Fetches the token only if it belongs to the given account.
pub async fn fetch_token(
    account: AccountId,
    token_id: TokenId,
    conn: &mut SqliteConnection,
) -> Result<Option<SettlementToken>, sqlx::Error> {
    let token = sqlx::query_as("SELECT * FROM settlement_tokens WHERE id = $1 AND account_id = $2")
        .bind(token_id)
        .bind(account)
        .fetch_optional(conn)
        .await?;
    Ok(token)
}

pub async fn fetch_default_token(
    account: AccountId,
    conn: &mut SqliteConnection,
) -> Result<Option<SettlementToken>, sqlx::Error> {
    let token = sqlx::query_as(
        "SELECT * FROM settlement_tokens WHERE account_id = $1 AND is_default = 1 AND is_active = 1 LIMIT 1",
    )
    .bind(account)
    .fetch_optional(conn)
    .await?;
    Ok(token)
}

/// Active tokens for the account, oldest first.
pub async fn fetch_active_tokens(
    account: AccountId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SettlementToken>, sqlx::Error> {
    let tokens = sqlx::query_as(
        "SELECT * FROM settlement_tokens WHERE account_id = $1 AND is_active = 1 ORDER BY created_at ASC, id ASC",
    )
    .bind(account)
    .fetch_all(conn)
    .await?;
    Ok(tokens)
}

pub async fn insert_token(
    account: AccountId,
    token: NewSettlementToken,
    is_default: bool,
    conn: &mut SqliteConnection,
) -> Result<SettlementToken, sqlx::Error> {
    let token = sqlx::query_as(
        r#"
            INSERT INTO settlement_tokens (account_id, token, card_last4, nickname, is_default, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(account)
    .bind(token.token.reveal())
    .bind(token.card_last4)
    .bind(token.nickname)
    .bind(is_default)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(token)
}

/// Clears the default flag on every token of the account. Returns the number of tokens that were changed.
pub async fn clear_default(account: AccountId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE settlement_tokens SET is_default = 0 WHERE account_id = $1 AND is_default = 1")
        .bind(account)
        .execute(conn)
        .await?;
    trace!("💳️ Cleared {} default token(s) for account #{account}", result.rows_affected());
    Ok(result.rows_affected())
}

/// Marks the token as the default. The caller must have cleared the previous default in the same database
/// transaction, otherwise the unique index on default tokens rejects the write.
pub async fn mark_default(token_id: TokenId, conn: &mut SqliteConnection) -> Result<SettlementToken, sqlx::Error> {
    let token = sqlx::query_as("UPDATE settlement_tokens SET is_default = 1 WHERE id = $1 AND is_active = 1 RETURNING *")
        .bind(token_id)
        .fetch_one(conn)
        .await?;
    Ok(token)
}

pub async fn retire(token_id: TokenId, conn: &mut SqliteConnection) -> Result<SettlementToken, sqlx::Error> {
    let token = sqlx::query_as("UPDATE settlement_tokens SET is_active = 0, is_default = 0 WHERE id = $1 RETURNING *")
        .bind(token_id)
        .fetch_one(conn)
        .await?;
    Ok(token)
}

pub async fn touch(token: &PaymentToken, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE settlement_tokens SET last_used_at = $1 WHERE token = $2")
        .bind(Utc::now())
        .bind(token.reveal())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

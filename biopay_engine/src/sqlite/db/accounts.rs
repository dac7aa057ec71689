use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Account, AccountId, NewAccount},
    traits::AccountDirectoryError,
};

pub async fn insert_account(account: NewAccount, conn: &mut SqliteConnection) -> Result<Account, AccountDirectoryError> {
    let requested_id = account.id;
    let now = Utc::now();
    let result: Result<Account, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO accounts (id, kind, display_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(account.id)
    .bind(account.kind)
    .bind(account.display_name)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(account) => {
            debug!("🗃️ {} account #{} created", account.kind, account.id);
            Ok(account)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(AccountDirectoryError::AccountAlreadyExists(requested_id.unwrap_or(AccountId(0))))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_account(id: AccountId, conn: &mut SqliteConnection) -> Result<Option<Account>, sqlx::Error> {
    let account = sqlx::query_as("SELECT * FROM accounts WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn set_face_enrolled(
    id: AccountId,
    face_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Account>, sqlx::Error> {
    let account = sqlx::query_as(
        "UPDATE accounts SET face_enrolled = $1, face_id = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(face_id.is_some())
    .bind(face_id)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(account)
}

pub async fn set_funding_ready(id: AccountId, ready: bool, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE accounts SET funding_ready = $1, updated_at = $2 WHERE id = $3")
        .bind(ready)
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Writes to the account row so that the surrounding database transaction takes the write lock before it reads
/// anything. Every token mutation for an account starts with this call, which serialises them. Returns false if the
/// account does not exist.
pub async fn lock_account(id: AccountId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE accounts SET updated_at = $1 WHERE id = $2").bind(Utc::now()).bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

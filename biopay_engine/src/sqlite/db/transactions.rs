use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        NewTransaction,
        PaymentState,
        Settlement,
        Transaction,
        TransactionId,
        TransactionRow,
        TransactionStatus,
    },
    traits::TransactionLedgerError,
    transaction_objects::TransactionQueryFilter,
};

fn into_transaction(row: TransactionRow) -> Result<Transaction, TransactionLedgerError> {
    Transaction::try_from(row).map_err(|e| TransactionLedgerError::CorruptRecord(e.to_string()))
}

/// Inserts a new pending transaction using the given connection. This is not atomic. You can embed this call inside a
/// transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_transaction(
    transaction: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<Transaction, TransactionLedgerError> {
    let transaction_id = transaction.transaction_id.clone();
    let result: Result<TransactionRow, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                transaction_id,
                payee_id,
                amount,
                currency,
                kind,
                description,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(transaction.transaction_id)
    .bind(transaction.payee)
    .bind(transaction.amount)
    .bind(transaction.currency)
    .bind(transaction.kind)
    .bind(transaction.description)
    .bind(transaction.created_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(row) => {
            debug!("🗃️ Transaction [{transaction_id}] inserted with id {}", row.id);
            into_transaction(row)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(TransactionLedgerError::TransactionAlreadyExists(transaction_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_transaction(
    id: &TransactionId,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, TransactionLedgerError> {
    let row: Option<TransactionRow> = sqlx::query_as("SELECT * FROM transactions WHERE transaction_id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    row.map(into_transaction).transpose()
}

pub async fn fetch_by_ledger_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, TransactionLedgerError> {
    let row: Option<TransactionRow> =
        sqlx::query_as("SELECT * FROM transactions WHERE ledger_reference = $1 ORDER BY id ASC LIMIT 1")
            .bind(reference)
            .fetch_optional(conn)
            .await?;
    row.map(into_transaction).transpose()
}

/// Writes `state` only if the stored status is still `expected`. Returns `None` if the row was not updated, either
/// because the transaction does not exist or because its status has moved on.
///
/// A payer, once stored, is kept. So is the first completion time.
pub async fn update_state(
    id: &TransactionId,
    expected: TransactionStatus,
    state: &PaymentState,
    settlement: Option<&Settlement>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, TransactionLedgerError> {
    let row: Option<TransactionRow> = sqlx::query_as(
        r#"
            UPDATE transactions SET
                status = $1,
                payer_id = COALESCE(payer_id, $2),
                biometric_verified = (COALESCE(payer_id, $2) IS NOT NULL),
                failure_reason = $3,
                completed_at = COALESCE(completed_at, $4),
                ledger_reference = COALESCE($5, ledger_reference),
                platform_fee = COALESCE($6, platform_fee),
                updated_at = $7
            WHERE transaction_id = $8 AND status = $9
            RETURNING *;
        "#,
    )
    .bind(state.status())
    .bind(state.payer())
    .bind(state.reason())
    .bind(state.completed_at())
    .bind(settlement.and_then(|s| s.ledger_reference.as_deref()))
    .bind(settlement.map(|s| s.platform_fee))
    .bind(Utc::now())
    .bind(id.as_str())
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ [{id}] {expected} -> {}: {}", state.status(), if row.is_some() { "written" } else { "not written" });
    row.map(into_transaction).transpose()
}

/// Sets the refund claim on a completed transaction. Returns false if the transaction is not `Completed` or the claim
/// is already held.
pub async fn claim_refund(id: &TransactionId, conn: &mut SqliteConnection) -> Result<bool, TransactionLedgerError> {
    let result = sqlx::query(
        r#"
            UPDATE transactions SET refund_claimed = 1, updated_at = $1
            WHERE transaction_id = $2 AND status = $3 AND refund_claimed = 0
        "#,
    )
    .bind(Utc::now())
    .bind(id.as_str())
    .bind(TransactionStatus::Completed)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Clears the refund claim, as long as the transaction was not refunded in the meantime.
pub async fn release_refund_claim(
    id: &TransactionId,
    conn: &mut SqliteConnection,
) -> Result<bool, TransactionLedgerError> {
    let result = sqlx::query(
        "UPDATE transactions SET refund_claimed = 0, updated_at = $1 WHERE transaction_id = $2 AND status = $3",
    )
    .bind(Utc::now())
    .bind(id.as_str())
    .bind(TransactionStatus::Completed)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fetches transactions according to criteria specified in the `TransactionQueryFilter`
///
/// Resulting transactions are ordered by `created_at` in ascending order
pub async fn search_transactions(
    query: TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, TransactionLedgerError> {
    let mut builder = QueryBuilder::new("SELECT * FROM transactions ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(payer) = query.payer {
        where_clause.push("payer_id = ");
        where_clause.push_bind_unseparated(payer);
    }
    if let Some(payee) = query.payee {
        where_clause.push("payee_id = ");
        where_clause.push_bind_unseparated(payee);
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(currency) = query.currency {
        where_clause.push("currency = ");
        where_clause.push_bind_unseparated(currency);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at < ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<TransactionRow>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_transactions: {:?}", rows.len());
    rows.into_iter().map(into_transaction).collect()
}

use std::{sync::Arc, time::Duration};

use log::*;
use tokio::task::JoinHandle;

use crate::{db_types::Transaction, PaymentFlowApi, SqliteDatabase};

/// Starts the expiry worker, which cancels payment sessions that were never verified. Pending transactions older than
/// `max_age` are cancelled every `period`.
///
/// Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker<L, I>(
    api: Arc<PaymentFlowApi<SqliteDatabase, L, I>>,
    max_age: chrono::Duration,
    period: Duration,
) -> JoinHandle<()>
where
    L: Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Payment session expiry worker started. Sessions expire after {} minutes.", max_age.num_minutes());
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment session expiry job");
            match api.expire_stale_transactions(max_age).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No payment sessions expired"),
                Ok(expired) => {
                    info!("🕰️ {} payment session(s) expired", expired.len());
                    debug!("🕰️ Expired: {}", transaction_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running payment session expiry job: {e}");
                },
            }
        }
    })
}

fn transaction_list(transactions: &[Transaction]) -> String {
    transactions
        .iter()
        .map(|t| format!("[{}] {} for merchant #{}", t.transaction_id, t.amount, t.payee))
        .collect::<Vec<String>>()
        .join(", ")
}

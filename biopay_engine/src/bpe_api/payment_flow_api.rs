use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    bpe_api::{
        config::PaymentFlowConfig,
        errors::PaymentFlowError,
        payment_objects::{
            BestEffortTransfer,
            ChargeResult,
            CriticalTransfer,
            FeeSplit,
            InitiatedPayment,
            NewPaymentRequest,
            RefundResult,
            TransferFailure,
        },
    },
    db_types::{
        AccountId,
        AccountKind,
        Money,
        NewTransaction,
        PaymentState,
        PaymentToken,
        Settlement,
        SettlementToken,
        Transaction,
        TransactionId,
        TransactionStatus,
    },
    events::{AuditRecordEvent, EventProducers},
    traits::{
        AccountDirectory,
        BiometricSample,
        IdentityGateway,
        LedgerGateway,
        PaymentTokenStore,
        TransactionLedger,
        TransactionLedgerError,
        TransferRequest,
    },
    transaction_objects::TransactionQueryFilter,
};

pub const REASON_NOT_IDENTIFIED: &str = "payer not identified";
pub const REASON_MISSING_TOKEN: &str = "missing payment token";
pub const REASON_TRANSFER_DECLINED: &str = "transfer declined";
pub const REASON_SESSION_EXPIRED: &str = "payment session expired";

/// `PaymentFlowApi` is the primary API for moving a payment from initiation, through biometric identification and
/// settlement, to completion and (optionally) refund.
///
/// It coordinates three systems that know nothing of each other: the banking ledger (`L`), the biometric identity
/// service (`I`) and the local database (`B`). There is no distributed transaction. Instead, the local transaction
/// record is written before and after every step that moves money, and the rules for which failures are fatal are
/// fixed:
///
/// * The principal transfer decides the outcome. If it fails, the payment fails.
/// * The platform fee transfer never changes the outcome. Failures are logged.
/// * Audit records are published after the outcome is persisted, and never waited on.
pub struct PaymentFlowApi<B, L, I> {
    db: B,
    ledger: L,
    identity: I,
    producers: EventProducers,
    config: PaymentFlowConfig,
}

impl<B, L, I> Debug for PaymentFlowApi<B, L, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B, L, I> PaymentFlowApi<B, L, I> {
    pub fn new(db: B, ledger: L, identity: I, producers: EventProducers, config: PaymentFlowConfig) -> Self {
        Self { db, ledger, identity, producers, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn config(&self) -> &PaymentFlowConfig {
        &self.config
    }
}

impl<B, L, I> PaymentFlowApi<B, L, I>
where
    B: TransactionLedger + PaymentTokenStore + AccountDirectory,
    L: LedgerGateway,
    I: IdentityGateway,
{
    /// Opens a payment session for a merchant. The payer is not known yet, and no money moves.
    ///
    /// The payee must exist, be a merchant and have a linked payment token.
    pub async fn initiate(&self, request: NewPaymentRequest) -> Result<InitiatedPayment, PaymentFlowError> {
        if !request.amount.is_positive() {
            return Err(PaymentFlowError::InvalidAmount(request.amount));
        }
        let currency = request.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentFlowError::InvalidCurrency(request.currency));
        }
        let payee = self
            .db
            .fetch_account(request.payee)
            .await?
            .ok_or_else(|| PaymentFlowError::NotReady(format!("Merchant #{} does not exist", request.payee)))?;
        if payee.kind != AccountKind::Merchant {
            return Err(PaymentFlowError::NotReady(format!("Account #{} is not a merchant", payee.id)));
        }
        if !payee.funding_ready {
            return Err(PaymentFlowError::NotReady(format!("Merchant #{} has not linked a payment card", payee.id)));
        }
        let mut new_tx = NewTransaction::payment(payee.id, request.amount, &currency);
        new_tx.description = request.description;
        let tx = self.db.insert_transaction(new_tx).await?;
        info!("🔄️🆕️ Payment [{}] of {} {currency} initiated for merchant #{}", tx.transaction_id, tx.amount, payee.id);
        let status = tx.status();
        Ok(InitiatedPayment { transaction_id: tx.transaction_id, status, amount: tx.amount })
    }

    /// Identifies the payer from the biometric sample and settles the payment.
    ///
    /// ## Outcomes
    /// * No face match: the transaction fails and `IdentificationFailed` is returned.
    /// * The payer has no payment card or no enrolled face: the transaction fails and `NotReady` is returned.
    /// * Either party has no default token: the transaction fails and `PaymentProcessingError` is returned.
    /// * The principal transfer is declined or times out: the transaction fails, and the result is returned normally
    ///   with `status == Failed`.
    /// * Otherwise the transaction completes. The fee leg outcome is reported in the result but cannot change it.
    ///
    /// If the biometric service itself cannot be reached, the transaction is left `Pending` so that the caller can try
    /// again, and `PaymentProcessingError` is returned.
    pub async fn verify_and_charge(
        &self,
        id: &TransactionId,
        sample: &BiometricSample,
    ) -> Result<ChargeResult, PaymentFlowError> {
        let tx = self.fetch_transaction(id).await?;
        if tx.status() != TransactionStatus::Pending {
            return Err(PaymentFlowError::InvalidState(format!(
                "Transaction {id} is {} and cannot be verified again",
                tx.status()
            )));
        }
        // 1. Who is paying?
        let payer = match self.identity.search_face(sample).await {
            Ok(Some(payer)) => payer,
            Ok(None) => {
                info!("🔄️🧑️ [{id}] No account matches the biometric sample");
                self.mark_failed(id, TransactionStatus::Pending, None, REASON_NOT_IDENTIFIED.to_string()).await?;
                return Err(PaymentFlowError::IdentificationFailed(format!(
                    "No enrolled account matches the sample for transaction {id}"
                )));
            },
            Err(e) => {
                warn!("🔄️🧑️ [{id}] Biometric search failed. The transaction stays pending. {e}");
                return Err(PaymentFlowError::PaymentProcessingError(e.to_string()));
            },
        };
        // 2. Can they pay?
        if let Err(reason) = self.check_payer_ready(payer).await? {
            info!("🔄️🧑️ [{id}] Account #{payer} cannot pay: {reason}");
            self.mark_failed(id, TransactionStatus::Pending, None, reason.clone()).await?;
            return Err(PaymentFlowError::NotReady(reason));
        }
        // 3. Attach the payer before any money moves.
        let tx = self.db.update_state(id, TransactionStatus::Pending, &PaymentState::Processing { payer }, None).await?;
        debug!("🔄️🧑️ [{id}] Payer #{payer} identified. Transaction is processing.");
        // 4. Where does the money go?
        let (payer_token, payee_token) = match self.resolve_tokens(payer, tx.payee).await? {
            Ok(tokens) => tokens,
            Err(missing) => {
                warn!("🔄️💳️ [{id}] {missing}");
                self.mark_failed(id, TransactionStatus::Processing, Some(payer), REASON_MISSING_TOKEN.to_string())
                    .await?;
                return Err(PaymentFlowError::PaymentProcessingError(missing));
            },
        };
        // 5. Principal transfer. This decides the outcome.
        let request = TransferRequest {
            sender: payer_token.token.clone(),
            receiver: payee_token.token.clone(),
            amount: tx.amount,
            description: tx.description.clone().unwrap_or_else(|| format!("BioPay payment {id}")),
        };
        let reference = match self.transfer(&request).await {
            CriticalTransfer::Settled { reference } => reference,
            CriticalTransfer::Declined { reason } => {
                warn!("🔄️🏦️ [{id}] Principal transfer of {} failed: {reason}", tx.amount);
                let failure = format!("{REASON_TRANSFER_DECLINED}: {reason}");
                let failed = self.mark_failed(id, TransactionStatus::Processing, Some(payer), failure).await?;
                return Ok(charge_result(&failed, None, None));
            },
        };
        info!("🔄️🏦️ [{id}] {} moved from #{payer} to merchant #{}", tx.amount, tx.payee);
        // 6. Platform fee. Best effort.
        let split = FeeSplit::new(tx.amount, self.config.platform_fee_bps);
        let fee_leg = self.collect_platform_fee(id, &payee_token.token, split.platform_fee).await;
        // 7. Record the outcome.
        let completed = PaymentState::Completed { payer, completed_at: Utc::now() };
        let collected = if fee_leg.is_settled() { split.platform_fee } else { Money::default() };
        let settlement = Settlement { ledger_reference: reference, platform_fee: collected };
        let tx = match self.db.update_state(id, TransactionStatus::Processing, &completed, Some(&settlement)).await {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "🔄️🚨️ [{id}] {} was transferred from #{payer} to merchant #{}, but the completion could not be \
                     recorded. Manual reconciliation is required. {e}",
                    tx.amount, tx.payee
                );
                return Err(e.into());
            },
        };
        if let Err(e) = self.db.touch_token(&payer_token.token).await {
            warn!("🔄️💳️ [{id}] Could not update the last use of token #{}. {e}", payer_token.id);
        }
        // 8. Audit, without waiting.
        self.publish_audit_records(&tx, payer, split);
        info!("🔄️✅️ [{id}] Payment completed. Merchant receives {}, platform fee {}", split.merchant_net, split.platform_fee);
        Ok(charge_result(&tx, Some(split), Some(fee_leg)))
    }

    /// Reverses a completed payment.
    ///
    /// The platform fee that was collected is returned to the merchant first (best effort), then the full amount goes
    /// back from the merchant to the payer. If that second transfer fails, the transaction stays `Completed` and
    /// `PaymentProcessingError` is returned.
    ///
    /// The transaction is claimed before any money moves, so a concurrent refund of the same transaction fails with
    /// `InvalidState` without touching the ledger. The claim is released if the refund does not go through.
    ///
    /// Transfers use the parties' *current* default tokens, which may differ from the ones used for the payment.
    pub async fn refund(&self, id: &TransactionId, reason: &str) -> Result<RefundResult, PaymentFlowError> {
        let not_refundable = |status: TransactionStatus| {
            PaymentFlowError::InvalidState(format!(
                "Only completed transactions can be refunded. Transaction {id} is {status}"
            ))
        };
        let tx = self.fetch_transaction(id).await?;
        if tx.status() != TransactionStatus::Completed {
            return Err(not_refundable(tx.status()));
        }
        let tx = match self.db.claim_refund(id).await {
            Ok(tx) => tx,
            Err(TransactionLedgerError::StatusConflict { actual, .. }) => return Err(not_refundable(actual)),
            Err(e) => {
                debug!("🔄️↩️ [{id}] Refund not started. {e}");
                return Err(e.into());
            },
        };
        let (payer, completed_at) = match tx.state {
            PaymentState::Completed { payer, completed_at } => (payer, completed_at),
            _ => return Err(not_refundable(tx.status())),
        };
        let fee_leg = match self.return_funds(&tx, payer, reason).await {
            Ok(fee_leg) => fee_leg,
            Err(e) => {
                if let Err(release) = self.db.release_refund_claim(id).await {
                    error!("🔄️🚨️ [{id}] Could not release the refund claim. Refunds are blocked until it is. {release}");
                }
                return Err(e);
            },
        };
        let refunded = PaymentState::Refunded { payer, completed_at, note: reason.to_string() };
        let tx = self.db.update_state(id, TransactionStatus::Completed, &refunded, None).await.map_err(|e| {
            error!("🔄️🚨️ [{id}] {} was refunded to #{payer}, but the refund could not be recorded. {e}", tx.amount);
            PaymentFlowError::from(e)
        })?;
        info!("🔄️↩️ [{id}] {} refunded to #{payer}", tx.amount);
        let status = tx.status();
        Ok(RefundResult { transaction_id: tx.transaction_id, status, amount: tx.amount, fee_leg })
    }

    /// The money movements of a refund. An error means nothing went back to the payer.
    async fn return_funds(
        &self,
        tx: &Transaction,
        payer: AccountId,
        reason: &str,
    ) -> Result<BestEffortTransfer, PaymentFlowError> {
        let id = &tx.transaction_id;
        let (payer_token, payee_token) = self
            .resolve_tokens(payer, tx.payee)
            .await?
            .map_err(|missing| PaymentFlowError::PaymentProcessingError(format!("Cannot refund {id}. {missing}")))?;
        debug!(
            "🔄️↩️ [{id}] Refunding {} from merchant token {} to payer token {}",
            tx.amount, payee_token.token, payer_token.token
        );
        let fee = tx.platform_fee.unwrap_or_default();
        let fee_leg = self.return_platform_fee(id, &payee_token.token, fee).await;
        let request = TransferRequest {
            sender: payee_token.token.clone(),
            receiver: payer_token.token.clone(),
            amount: tx.amount,
            description: format!("Refund: {reason}"),
        };
        if let CriticalTransfer::Declined { reason: failure } = self.transfer(&request).await {
            if fee_leg.is_settled() {
                error!(
                    "🔄️🚨️ [{id}] The platform fee of {fee} was returned to merchant #{}, but the refund to #{payer} \
                     failed. Manual reconciliation is required.",
                    tx.payee
                );
            }
            warn!("🔄️↩️ [{id}] Refund transfer failed: {failure}");
            return Err(PaymentFlowError::PaymentProcessingError(format!("Refund transfer for {id} failed: {failure}")));
        }
        Ok(fee_leg)
    }

    async fn check_payer_ready(&self, payer: AccountId) -> Result<Result<(), String>, PaymentFlowError> {
        let account = match self.db.fetch_account(payer).await? {
            Some(account) => account,
            None => return Ok(Err(format!("identified account #{payer} does not exist"))),
        };
        let readiness = if account.kind != AccountKind::User {
            Err(format!("account #{payer} is not a user account"))
        } else if !account.funding_ready {
            Err("payer has not linked a payment card".to_string())
        } else if !account.face_enrolled {
            Err("payer has not enrolled a biometric profile".to_string())
        } else {
            Ok(())
        };
        Ok(readiness)
    }

    /// The current default tokens of the payer and payee. The inner error describes which one is missing.
    async fn resolve_tokens(
        &self,
        payer: AccountId,
        payee: AccountId,
    ) -> Result<Result<(SettlementToken, SettlementToken), String>, PaymentFlowError> {
        let payer_token = self.db.fetch_default_token(payer).await?;
        let payee_token = self.db.fetch_default_token(payee).await?;
        let tokens = match (payer_token, payee_token) {
            (Some(a), Some(b)) => Ok((a, b)),
            (None, _) => Err(format!("Payer #{payer} has no default payment token")),
            (_, None) => Err(format!("Merchant #{payee} has no default payment token")),
        };
        Ok(tokens)
    }

    async fn transfer(&self, request: &TransferRequest) -> CriticalTransfer {
        trace!("🔄️🏦️ Transfer {request}");
        let timeout = self.config.transfer_timeout;
        match tokio::time::timeout(timeout, self.ledger.transfer(request)).await {
            Ok(Some(receipt)) => CriticalTransfer::Settled { reference: receipt.reference },
            Ok(None) => CriticalTransfer::Declined { reason: TransferFailure::Declined },
            Err(_) => CriticalTransfer::Declined { reason: TransferFailure::TimedOut(timeout) },
        }
    }

    async fn collect_platform_fee(&self, id: &TransactionId, payee: &PaymentToken, fee: Money) -> BestEffortTransfer {
        let platform = match self.platform_leg_precondition(fee) {
            Ok(token) => token,
            Err(skipped) => return skipped,
        };
        let request = TransferRequest {
            sender: payee.clone(),
            receiver: platform,
            amount: fee,
            description: format!("Platform fee for {id}"),
        };
        let outcome = BestEffortTransfer::from(self.transfer(&request).await);
        if let BestEffortTransfer::Failed { reason } = &outcome {
            warn!("🔄️💸️ [{id}] Platform fee of {fee} could not be collected: {reason}. The payment is unaffected.");
        }
        outcome
    }

    async fn return_platform_fee(&self, id: &TransactionId, payee: &PaymentToken, fee: Money) -> BestEffortTransfer {
        let platform = match self.platform_leg_precondition(fee) {
            Ok(token) => token,
            Err(skipped) => return skipped,
        };
        let request = TransferRequest {
            sender: platform,
            receiver: payee.clone(),
            amount: fee,
            description: format!("Platform fee refund for {id}"),
        };
        let outcome = BestEffortTransfer::from(self.transfer(&request).await);
        if let BestEffortTransfer::Failed { reason } = &outcome {
            warn!("🔄️💸️ [{id}] Platform fee of {fee} could not be returned to the merchant: {reason}");
        }
        outcome
    }

    fn platform_leg_precondition(&self, fee: Money) -> Result<PaymentToken, BestEffortTransfer> {
        if !fee.is_positive() {
            return Err(BestEffortTransfer::Skipped { reason: "no fee is due".into() });
        }
        match &self.config.platform_token {
            Some(token) => Ok(token.clone()),
            None => {
                warn!("🔄️💸️ No platform payment token is configured. The fee transfer of {fee} is skipped.");
                Err(BestEffortTransfer::Skipped { reason: "no platform token configured".into() })
            },
        }
    }

    fn publish_audit_records(&self, tx: &Transaction, payer: AccountId, split: FeeSplit) {
        let now = Utc::now();
        let id = &tx.transaction_id;
        let records = [
            AuditRecordEvent::merchant_leg(id, payer, tx.payee, split.merchant_net, now),
            AuditRecordEvent::fee_leg(id, tx.payee, split.platform_fee, now),
        ];
        for record in records {
            let delivered = self.producers.publish_audit_record(record);
            trace!("🔄️🧾️ [{id}] Audit record handed to {delivered} subscriber(s)");
        }
    }
}

impl<B, L, I> PaymentFlowApi<B, L, I>
where B: TransactionLedger
{
    pub async fn fetch_transaction(&self, id: &TransactionId) -> Result<Transaction, PaymentFlowError> {
        self.db.fetch_transaction(id).await?.ok_or_else(|| PaymentFlowError::TransactionNotFound(id.clone()))
    }

    /// Cancels a payment that has not been verified yet.
    pub async fn cancel(&self, id: &TransactionId, reason: &str) -> Result<Transaction, PaymentFlowError> {
        let tx = self.fetch_transaction(id).await?;
        if tx.status() != TransactionStatus::Pending {
            return Err(PaymentFlowError::InvalidState(format!(
                "Only pending transactions can be cancelled. Transaction {id} is {}",
                tx.status()
            )));
        }
        let cancelled = PaymentState::Cancelled { reason: reason.to_string() };
        let tx = self.db.update_state(id, TransactionStatus::Pending, &cancelled, None).await?;
        info!("🔄️❌️ [{id}] Payment cancelled: {reason}");
        Ok(tx)
    }

    /// Cancels every pending transaction created more than `max_age` ago. Transactions that leave `Pending` while this
    /// runs (because they are being verified) are left alone.
    pub async fn expire_stale_transactions(
        &self,
        max_age: chrono::Duration,
    ) -> Result<Vec<Transaction>, PaymentFlowError> {
        let cutoff = Utc::now() - max_age;
        let query = TransactionQueryFilter::default().with_status(TransactionStatus::Pending).until(cutoff);
        let stale = self.db.search_transactions(query).await?;
        let mut expired = Vec::with_capacity(stale.len());
        let cancelled = PaymentState::Cancelled { reason: REASON_SESSION_EXPIRED.to_string() };
        for tx in stale {
            let id = &tx.transaction_id;
            match self.db.update_state(id, TransactionStatus::Pending, &cancelled, None).await {
                Ok(tx) => expired.push(tx),
                Err(TransactionLedgerError::StatusConflict { actual, .. }) => {
                    debug!("🕰️ [{id}] moved to {actual} before it could expire");
                },
                Err(e) => return Err(e.into()),
            }
        }
        Ok(expired)
    }

    /// The transaction whose principal transfer has the given banking reference.
    pub async fn transaction_by_ledger_reference(&self, reference: &str) -> Result<Transaction, PaymentFlowError> {
        self.db.fetch_transaction_by_ledger_reference(reference).await?.ok_or_else(|| {
            PaymentFlowError::TransactionNotFound(TransactionId(format!("(ledger reference {reference})")))
        })
    }

    /// Fails the transaction. `payer` must be `None` when failing from `Pending`.
    async fn mark_failed(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        payer: Option<AccountId>,
        reason: String,
    ) -> Result<Transaction, PaymentFlowError> {
        let state = PaymentState::Failed { payer, reason };
        let tx = self.db.update_state(id, expected, &state, None).await?;
        debug!("🔄️❌️ [{id}] Payment failed: {}", tx.failure_reason().unwrap_or_default());
        Ok(tx)
    }
}

fn charge_result(tx: &Transaction, split: Option<FeeSplit>, fee_leg: Option<BestEffortTransfer>) -> ChargeResult {
    ChargeResult {
        transaction_id: tx.transaction_id.clone(),
        status: tx.status(),
        verified: tx.biometric_verified(),
        amount: tx.amount,
        payer: tx.payer(),
        split,
        fee_leg,
        failure_reason: tx.failure_reason().map(String::from),
    }
}

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use biopay_engine::{
    db_types::{AccountId, PaymentToken},
    traits::{
        BiometricSample,
        CardDetails,
        IdentityGateway,
        IdentityGatewayError,
        LedgerGateway,
        TransferReceipt,
        TransferRequest,
        VerifiedCard,
    },
};
use mockall::mock;

mock! {
    pub Identity {}
    impl IdentityGateway for Identity {
        async fn search_face(&self, sample: &BiometricSample) -> Result<Option<AccountId>, IdentityGatewayError>;
        async fn link_face(&self, account: AccountId, face_id: &str) -> Result<bool, IdentityGatewayError>;
        async fn delete_face(&self, account: AccountId) -> Result<bool, IdentityGatewayError>;
    }
}

/// An identity service that recognises every sample as `account`.
pub fn identity_matching(account: i64) -> MockIdentity {
    let mut identity = MockIdentity::new();
    identity.expect_search_face().returning(move |_| Ok(Some(AccountId(account))));
    identity
}

#[derive(Default)]
struct LedgerState {
    transfers: Vec<TransferRequest>,
    declined_receivers: Vec<PaymentToken>,
    delay: Option<Duration>,
    card: Option<VerifiedCard>,
    card_checks: usize,
}

/// An in-memory banking system. Every transfer attempt is recorded, whether or not it succeeds. Clones share state, so
/// a test can keep a handle after giving one to the API.
#[derive(Clone, Default)]
pub struct FakeLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl FakeLedger {
    /// Transfers into `token` are declined.
    pub fn decline_transfers_to(&self, token: &str) {
        self.state.lock().unwrap().declined_receivers.push(PaymentToken::new(token));
    }

    pub fn stop_declining(&self) {
        self.state.lock().unwrap().declined_receivers.clear();
    }

    /// Every transfer takes `delay` to answer.
    pub fn delay_transfers(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Card verification succeeds and issues this token.
    pub fn accept_cards(&self, token: &str, last4: &str) {
        self.state.lock().unwrap().card =
            Some(VerifiedCard { token: PaymentToken::new(token), card_last4: last4.to_string() });
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn card_checks(&self) -> usize {
        self.state.lock().unwrap().card_checks
    }
}

impl LedgerGateway for FakeLedger {
    async fn transfer(&self, request: &TransferRequest) -> Option<TransferReceipt> {
        let (delay, declined, n) = {
            let mut state = self.state.lock().unwrap();
            state.transfers.push(request.clone());
            (state.delay, state.declined_receivers.contains(&request.receiver), state.transfers.len())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if declined {
            None
        } else {
            Some(TransferReceipt { reference: Some(format!("bank-{n}")) })
        }
    }

    async fn verify_card(&self, _card: &CardDetails) -> Option<VerifiedCard> {
        let mut state = self.state.lock().unwrap();
        state.card_checks += 1;
        state.card.clone()
    }
}

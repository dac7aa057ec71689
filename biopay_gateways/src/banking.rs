use biopay_engine::{
    db_types::PaymentToken,
    traits::{CardDetails, LedgerGateway, TransferReceipt, TransferRequest, VerifiedCard},
};
use log::*;
use reqwest::Method;

use crate::{
    config::BankingConfig,
    data_objects::{TransferBody, TransferResponse, VerifyCardBody, VerifyCardResponse},
    http::JsonClient,
    GatewayError,
};

/// Client for the banking system's external transfer API.
///
/// Every failure (transport errors, timeouts, non-2xx responses, malformed bodies, `success: false`) is logged and
/// reported to the engine as `None`.
#[derive(Clone)]
pub struct BankingClient {
    http: JsonClient,
}

impl BankingClient {
    pub fn new(config: BankingConfig) -> Result<Self, GatewayError> {
        let http = JsonClient::new(&config.base_url, config.timeout)?;
        info!("🏦️ Banking client for {} created", config.base_url);
        Ok(Self { http })
    }
}

impl LedgerGateway for BankingClient {
    async fn transfer(&self, request: &TransferRequest) -> Option<TransferReceipt> {
        let body = TransferBody {
            sender_token: request.sender.reveal(),
            receiver_token: request.receiver.reveal(),
            amount: request.amount.to_string(),
            description: &request.description,
        };
        let response = self
            .http
            .json_query::<TransferResponse, _>(Method::POST, "/api/external/transfer", Some(body))
            .await
            .map_err(|e| error!("🏦️ Transfer of {} could not be completed. {e}", request.amount))
            .ok()?;
        if response.success {
            info!("🏦️ Transfer successful: {request}");
            Some(TransferReceipt { reference: response.transaction_id })
        } else {
            let reason = response.message.unwrap_or_else(|| "Unknown error".into());
            warn!("🏦️ Transfer declined: {request}. {reason}");
            None
        }
    }

    async fn verify_card(&self, card: &CardDetails) -> Option<VerifiedCard> {
        let body =
            VerifyCardBody { card_number: card.card_number.reveal(), cvv: card.cvv.reveal(), expiry: &card.expiry };
        let response = self
            .http
            .json_query::<VerifyCardResponse, _>(Method::POST, "/api/external/verify-card", Some(body))
            .await
            .map_err(|e| error!("🏦️ Could not verify {card:?}. {e}"))
            .ok()?;
        match response.payment_token {
            Some(token) if response.success && !token.is_empty() => {
                debug!("🏦️ {card:?} verified");
                Some(VerifiedCard { token: PaymentToken::new(token), card_last4: card.last4() })
            },
            _ => {
                let reason = response.message.unwrap_or_else(|| "no payment token issued".into());
                warn!("🏦️ {card:?} was not verified. {reason}");
                None
            },
        }
    }
}

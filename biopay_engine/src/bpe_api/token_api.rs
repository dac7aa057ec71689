//! Links, lists and retires the settlement tokens that stand in for a user's or merchant's payment card.

use std::fmt::Debug;

use log::*;

use crate::{
    bpe_api::errors::TokenApiError,
    db_types::{AccountId, NewSettlementToken, SettlementToken, TokenId},
    traits::{CardDetails, LedgerGateway, PaymentTokenStore, RetiredToken},
};

pub struct TokenApi<B, L> {
    db: B,
    ledger: L,
}

impl<B: Debug, L> Debug for TokenApi<B, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenApi ({:?})", self.db)
    }
}

impl<B, L> TokenApi<B, L>
where
    B: PaymentTokenStore,
    L: LedgerGateway,
{
    pub fn new(db: B, ledger: L) -> Self {
        Self { db, ledger }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Has the banking system verify the card, then links the token it issues to the account.
    ///
    /// The raw card details never reach the token store. Only the token and the last four digits are kept.
    pub async fn link_card(
        &self,
        account: AccountId,
        card: &CardDetails,
        nickname: Option<String>,
        make_default: bool,
    ) -> Result<SettlementToken, TokenApiError> {
        debug!("💳️ Verifying {card:?} for account #{account}");
        let verified = self.ledger.verify_card(card).await.ok_or_else(|| {
            info!("💳️ The card ending {} could not be verified for account #{account}", card.last4());
            TokenApiError::CardVerificationFailed
        })?;
        let mut token = NewSettlementToken::new(verified.token).with_card_last4(verified.card_last4);
        token.nickname = nickname;
        token.make_default = make_default;
        self.link_token(account, token).await
    }

    /// Links a token that was issued out of band. The account's first token always becomes its default.
    pub async fn link_token(
        &self,
        account: AccountId,
        token: NewSettlementToken,
    ) -> Result<SettlementToken, TokenApiError> {
        let linked = self.db.link_token(account, token).await?;
        info!("💳️ Account #{account} linked payment token #{} ({})", linked.id, linked.token);
        Ok(linked)
    }

    pub async fn default_token(&self, account: AccountId) -> Result<SettlementToken, TokenApiError> {
        self.db.fetch_default_token(account).await?.ok_or(TokenApiError::NoDefaultToken(account))
    }

    /// All active tokens of the account, oldest first.
    pub async fn tokens(&self, account: AccountId) -> Result<Vec<SettlementToken>, TokenApiError> {
        let tokens = self.db.fetch_tokens(account).await?;
        Ok(tokens)
    }

    pub async fn set_default(&self, account: AccountId, token_id: TokenId) -> Result<SettlementToken, TokenApiError> {
        let token = self.db.set_default_token(account, token_id).await?;
        Ok(token)
    }

    /// Retires a token. If it was the default, the oldest remaining token takes its place. If none remain, the
    /// account can no longer pay or be paid until a new card is linked.
    pub async fn retire(&self, account: AccountId, token_id: TokenId) -> Result<RetiredToken, TokenApiError> {
        let retired = self.db.retire_token(account, token_id).await?;
        if !retired.funding_ready {
            warn!("💳️ Account #{account} retired its last payment token");
        }
        Ok(retired)
    }
}

use crate::db_types::SettlementToken;

/// The outcome of retiring a settlement token.
#[derive(Debug, Clone)]
pub struct RetiredToken {
    /// The token as it was after retirement (inactive, never default).
    pub retired: SettlementToken,
    /// The token that became the account's default because the retired one was the default. `None` if the retired
    /// token was not the default, or if no active tokens remain.
    pub promoted: Option<SettlementToken>,
    /// False when the account has no active tokens left.
    pub funding_ready: bool,
}

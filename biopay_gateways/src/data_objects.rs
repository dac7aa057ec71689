//! Wire formats of the banking, biometric and audit relay services.
use biopay_engine::events::AuditRecordEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

//--------------------------------------       Banking        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody<'a> {
    pub sender_token: &'a str,
    pub receiver_token: &'a str,
    /// Major units with two decimals, e.g. `"50.00"`
    pub amount: String,
    pub description: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCardBody<'a> {
    pub card_number: &'a str,
    pub cvv: &'a str,
    pub expiry: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCardResponse {
    #[serde(default)]
    pub success: bool,
    pub payment_token: Option<String>,
    pub message: Option<String>,
}

//--------------------------------------      Biometric       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct FaceSearchBody<'a> {
    pub image_base64: &'a str,
    pub top_k: u32,
    pub search_type: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceSearchResponse {
    #[serde(default)]
    pub matches: Vec<FaceMatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceMatch {
    /// The service sends numbers or numeric strings.
    pub user_id: Value,
}

impl FaceMatch {
    pub fn account_id(&self) -> Option<i64> {
        match &self.user_id {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkFaceBody<'a> {
    pub user_id: i64,
    pub face_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteFaceBody {
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}

//--------------------------------------     Audit relay      ---------------------------------------------------------
/// One money movement as the audit relay records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub tx_id_offchain: String,
    /// Minor units
    pub amount: i64,
    /// Unix seconds
    pub timestamp: i64,
    pub from_id: String,
    pub to_id: String,
}

impl From<&AuditRecordEvent> for AuditRecord {
    fn from(event: &AuditRecordEvent) -> Self {
        Self {
            tx_id_offchain: event.record_id.clone(),
            amount: event.amount.value(),
            timestamp: event.timestamp.timestamp(),
            from_id: event.from.to_string(),
            to_id: event.to.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditReceipt {
    #[serde(default)]
    pub status: String,
    pub message: Option<String>,
    pub data: Option<AuditData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditData {
    pub tx_id_offchain: Option<String>,
    pub blockchain_tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<String>,
    pub data_hash: Option<String>,
}

use serde::{Deserialize, Serialize};

/// Parameters for opening a gateway checkout session.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
    pub email: String,
    /// Charge amount in the currency's minor unit.
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    pub reference: String,
    pub callback_url: String,
    /// Opaque payload echoed back on verification. Carries the seller id for
    /// ledgers whose row does not exist until settlement.
    pub metadata: serde_json::Value,
}

/// A checkout session the buyer is redirected into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub reference: String,
}

/// Provider's word on a transaction, normalized for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    /// True only when the provider reports the terminal `success` status.
    pub success: bool,
    /// Raw provider status string, kept for logs and mismatch reports.
    pub raw_status: String,
    pub amount_minor: i64,
    pub metadata: serde_json::Value,
}

/// Response envelope every gateway endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub(crate) struct GatewayEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyData {
    pub status: String,
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl From<VerifyData> for VerifyOutcome {
    fn from(data: VerifyData) -> Self {
        Self {
            success: data.status == "success",
            raw_status: data.status,
            amount_minor: data.amount_minor,
            metadata: data.metadata,
        }
    }
}

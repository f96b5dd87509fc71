use actix_web::{web, HttpResponse};
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};

use alebaz_domain::model::{NewVerification, PaymentReference, ReferenceKind, SellerId};
use alebaz_domain::plan::VERIFICATION_FEE_MINOR;
use alebaz_domain::storage::{SellerStore, VerificationStore};
use alebaz_payments::gateway::{InitializeRequest, PaymentGateway};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
pub struct InitiateVerificationRequest {
    pub seller_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitiateVerificationResponse {
    pub reference: String,
    pub amount_minor: i64,
    pub authorization_url: String,
}

/// Opens a paid identity-verification checkout. The pending row is written
/// before the gateway call; a gateway outage leaves it retryable.
pub async fn initiate_verification_handler(
    state: web::Data<AppState>,
    payload: web::Json<InitiateVerificationRequest>,
) -> Result<HttpResponse, ApiError> {
    let seller = SellerId::new(payload.seller_id);
    let Some(profile) = state.storage().find_seller(&seller).await? else {
        counter!("api_verification_requests_total", "status" => "unknown_seller").increment(1);
        return Err(ApiError::NotFound);
    };

    let reference = PaymentReference::generate(ReferenceKind::Verification)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    state
        .storage()
        .create_verification(NewVerification {
            seller,
            reference: reference.clone(),
            amount_minor: VERIFICATION_FEE_MINOR,
            created_at: Utc::now(),
        })
        .await?;

    let transaction = state
        .gateway()
        .initialize(InitializeRequest {
            email: profile.email,
            amount_minor: VERIFICATION_FEE_MINOR,
            reference: reference.as_str().to_string(),
            callback_url: state.payment_callback_url().to_string(),
            metadata: serde_json::json!({
                "seller_id": seller.get(),
                "ledger": "verification",
            }),
        })
        .await?;

    counter!("api_verification_requests_total", "status" => "initiated").increment(1);
    Ok(HttpResponse::Created().json(InitiateVerificationResponse {
        reference: reference.as_str().to_string(),
        amount_minor: VERIFICATION_FEE_MINOR,
        authorization_url: transaction.authorization_url,
    }))
}

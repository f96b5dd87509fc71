use actix_web::{web, HttpResponse};
use metrics::counter;
use serde::{Deserialize, Serialize};

use alebaz_domain::model::{PaymentReference, ReferenceKind, SellerId};
use alebaz_domain::plan::SUBSCRIPTION_YEARLY_PRICE_MINOR;
use alebaz_domain::storage::SellerStore;
use alebaz_payments::gateway::{InitializeRequest, PaymentGateway};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
pub struct InitiateSubscriptionRequest {
    pub seller_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitiateSubscriptionResponse {
    pub reference: String,
    pub amount_minor: i64,
    pub authorization_url: String,
}

/// Opens a yearly-subscription checkout. No ledger row exists until the
/// payment settles, so the seller id travels in the gateway metadata.
pub async fn initiate_subscription_handler(
    state: web::Data<AppState>,
    payload: web::Json<InitiateSubscriptionRequest>,
) -> Result<HttpResponse, ApiError> {
    let seller = SellerId::new(payload.seller_id);
    let Some(profile) = state.storage().find_seller(&seller).await? else {
        counter!("api_subscription_requests_total", "status" => "unknown_seller").increment(1);
        return Err(ApiError::NotFound);
    };

    let reference = PaymentReference::generate(ReferenceKind::Subscription)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let transaction = state
        .gateway()
        .initialize(InitializeRequest {
            email: profile.email,
            amount_minor: SUBSCRIPTION_YEARLY_PRICE_MINOR,
            reference: reference.as_str().to_string(),
            callback_url: state.payment_callback_url().to_string(),
            metadata: serde_json::json!({
                "seller_id": seller.get(),
                "ledger": "subscription",
            }),
        })
        .await?;

    counter!("api_subscription_requests_total", "status" => "initiated").increment(1);
    Ok(HttpResponse::Created().json(InitiateSubscriptionResponse {
        reference: reference.as_str().to_string(),
        amount_minor: SUBSCRIPTION_YEARLY_PRICE_MINOR,
        authorization_url: transaction.authorization_url,
    }))
}

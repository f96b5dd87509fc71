use actix_web::{web, HttpResponse};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use alebaz_domain::model::{
    validate_proof_hash, ApprovalOutcome, NewPromotion, PaymentMethod, PaymentReference,
    PromotionRecord, ReferenceKind, SellerId, SubmitOutcome,
};
use alebaz_domain::plan::lookup_plan;
use alebaz_domain::services::notifier::{notify_best_effort, SellerEvent};
use alebaz_domain::services::ratings::RatingSource;
use alebaz_domain::storage::{PromotionStore, SellerStore};
use alebaz_payments::gateway::{InitializeRequest, PaymentGateway};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitPromotionRequest {
    pub seller_id: i64,
    pub plan: String,
    pub payment_method: String,
    /// Required for `crypto_proof` submissions, ignored otherwise.
    pub proof_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PromotionState {
    PendingPayment,
    PendingApproval,
    Approved,
    AlreadyApproved,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitPromotionResponse {
    pub promotion_id: i64,
    pub status: PromotionState,
    pub plan: String,
    pub amount_minor: i64,
    pub ends_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
}

pub async fn submit_promotion_handler(
    state: web::Data<AppState>,
    payload: web::Json<SubmitPromotionRequest>,
) -> Result<HttpResponse, ApiError> {
    let Some((plan, spec)) = lookup_plan(&payload.plan) else {
        counter!("api_promotion_requests_total", "status" => "unknown_plan").increment(1);
        return Err(ApiError::Validation(format!(
            "unknown plan `{}`",
            payload.plan
        )));
    };
    let method: PaymentMethod = payload.payment_method.parse().map_err(|_| {
        counter!("api_promotion_requests_total", "status" => "bad_method").increment(1);
        ApiError::Validation(format!(
            "unknown payment method `{}`",
            payload.payment_method
        ))
    })?;

    let seller = SellerId::new(payload.seller_id);
    let Some(profile) = state.storage().find_seller(&seller).await? else {
        counter!("api_promotion_requests_total", "status" => "unknown_seller").increment(1);
        return Err(ApiError::NotFound);
    };

    let (reference, proof_hash) = match method {
        PaymentMethod::Gateway => {
            let reference = PaymentReference::generate(ReferenceKind::Promotion)
                .map_err(|err| ApiError::Internal(err.to_string()))?;
            (Some(reference), None)
        }
        PaymentMethod::CryptoProof => {
            let Some(hash) = payload.proof_hash.as_deref() else {
                return Err(ApiError::Validation(
                    "crypto_proof submissions require a proof_hash".to_string(),
                ));
            };
            validate_proof_hash(hash).map_err(|err| ApiError::Validation(err.to_string()))?;
            (None, Some(hash.to_string()))
        }
    };

    let now = Utc::now();
    let outcome = state
        .storage()
        .submit_promotion(NewPromotion {
            seller,
            plan,
            duration_days: spec.duration_days,
            starts_at: now,
            ends_at: now + Duration::days(spec.duration_days as i64),
            payment_method: method,
            reference: reference.clone(),
            proof_hash,
            amount_minor: spec.price_minor,
            // Nothing goes live at submit time: gateway rows wait for
            // reconciliation, crypto rows for admin approval.
            active: false,
            approved: false,
        })
        .await?;

    let record = match outcome {
        SubmitOutcome::Created(record) => record,
        SubmitOutcome::DuplicateActive { ends_at } => {
            counter!("api_promotion_requests_total", "status" => "duplicate_active").increment(1);
            return Err(ApiError::DuplicateActivePromotion { ends_at });
        }
    };

    notify_best_effort(
        state.notifier(),
        seller,
        SellerEvent::PromotionSubmitted { plan },
    )
    .await;

    match reference {
        Some(reference) => {
            let transaction = state
                .gateway()
                .initialize(InitializeRequest {
                    email: profile.email,
                    amount_minor: spec.price_minor,
                    reference: reference.as_str().to_string(),
                    callback_url: state.payment_callback_url().to_string(),
                    metadata: serde_json::json!({
                        "seller_id": seller.get(),
                        "ledger": "promotion",
                    }),
                })
                .await?;
            counter!("api_promotion_requests_total", "status" => "pending_payment").increment(1);
            Ok(
                HttpResponse::Created().json(build_submit_response(
                    &record,
                    PromotionState::PendingPayment,
                    Some(transaction.authorization_url),
                )),
            )
        }
        None => {
            counter!("api_promotion_requests_total", "status" => "pending_approval").increment(1);
            Ok(HttpResponse::Accepted().json(build_submit_response(
                &record,
                PromotionState::PendingApproval,
                None,
            )))
        }
    }
}

fn build_submit_response(
    record: &PromotionRecord,
    status: PromotionState,
    authorization_url: Option<String>,
) -> SubmitPromotionResponse {
    SubmitPromotionResponse {
        promotion_id: record.id,
        status,
        plan: record.plan.to_string(),
        amount_minor: record.amount_minor,
        ends_at: record.ends_at,
        reference: record.reference.as_ref().map(|r| r.as_str().to_string()),
        authorization_url,
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub promotion_id: i64,
    pub status: PromotionState,
    pub active: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub ends_at: DateTime<Utc>,
}

/// Admin approval of a crypto-paid promotion. Internal listener only.
pub async fn approve_promotion_handler(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let outcome = match state.storage().approve_promotion(id, Utc::now()).await? {
        Some(outcome) => outcome,
        None => {
            counter!("api_approve_requests_total", "status" => "not_found").increment(1);
            return Err(ApiError::NotFound);
        }
    };

    let (record, status) = match outcome {
        ApprovalOutcome::Approved(record) => {
            counter!("api_approve_requests_total", "status" => "approved").increment(1);
            notify_best_effort(
                state.notifier(),
                record.seller,
                SellerEvent::PromotionActivated {
                    plan: record.plan,
                    ends_at: record.ends_at,
                },
            )
            .await;
            (record, PromotionState::Approved)
        }
        ApprovalOutcome::AlreadyApproved(record) => {
            counter!("api_approve_requests_total", "status" => "already_approved").increment(1);
            (record, PromotionState::AlreadyApproved)
        }
        ApprovalOutcome::Blocked { ends_at } => {
            counter!("api_approve_requests_total", "status" => "blocked").increment(1);
            return Err(ApiError::DuplicateActivePromotion { ends_at });
        }
    };

    Ok(HttpResponse::Ok().json(ApprovalResponse {
        promotion_id: record.id,
        status,
        active: record.active,
        approved_at: record.approved_at,
        ends_at: record.ends_at,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeaturedEntry {
    pub seller_id: i64,
    pub shop_name: String,
    pub plan: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeaturedResponse {
    pub sellers: Vec<FeaturedEntry>,
}

pub async fn featured_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let featured = state.storage().list_featured(Utc::now()).await?;

    let mut sellers = Vec::with_capacity(featured.len());
    for entry in featured {
        let average_rating = state.ratings().average_rating(&entry.seller).await;
        sellers.push(FeaturedEntry {
            seller_id: entry.seller.get(),
            shop_name: entry.shop_name,
            plan: entry.plan.to_string(),
            starts_at: entry.starts_at,
            ends_at: entry.ends_at,
            average_rating,
        });
    }

    Ok(HttpResponse::Ok().json(FeaturedResponse { sellers }))
}

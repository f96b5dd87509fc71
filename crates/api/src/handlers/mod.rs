pub mod metrics;
pub mod payments;
pub mod promotion;
pub mod subscription;
pub mod verification;

pub use metrics::metrics_handler;
pub use payments::{callback_handler, webhook_handler};
pub use promotion::{approve_promotion_handler, featured_handler, submit_promotion_handler};
pub use subscription::initiate_subscription_handler;
pub use verification::initiate_verification_handler;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use alebaz_domain::storage::StorageError;
use alebaz_payments::gateway::GatewayError;
use alebaz_payments::reconcile::ReconcileError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("seller already holds an active promotion")]
    DuplicateActivePromotion { ends_at: DateTime<Utc> },
    #[error("not found")]
    NotFound,
    #[error("payment gateway unavailable")]
    GatewayUnavailable,
    #[error("unexpected gateway response: {0}")]
    GatewayProtocol(String),
    /// Provider state disagrees with the ledger; flagged for manual review.
    #[error("payment could not be reconciled: {0}")]
    ReconciliationMismatch(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(_) => ApiError::GatewayUnavailable,
            GatewayError::Protocol(message) => ApiError::GatewayProtocol(message),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::NotFound(_) => ApiError::NotFound,
            ReconcileError::Gateway(gateway) => gateway.into(),
            ReconcileError::AmountMismatch { .. } => {
                ApiError::ReconciliationMismatch(err.to_string())
            }
            ReconcileError::BadMetadata(message) => ApiError::ReconciliationMismatch(message),
            ReconcileError::Storage(storage) => ApiError::Storage(storage),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateActivePromotion { .. } => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GatewayProtocol(_) => StatusCode::BAD_GATEWAY,
            ApiError::ReconciliationMismatch(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let active_until = match self {
            ApiError::DuplicateActivePromotion { ends_at } => Some(*ends_at),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            active_until,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    /// End date of the blocking promotion on duplicate-active conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_until: Option<DateTime<Utc>>,
}

//! Gateway settlement transports. The browser callback and the provider
//! webhook both funnel into the shared reconciliation routine; neither
//! trusts its own payload over a fresh provider verification.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use hmac::{Hmac, Mac};
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use tracing::warn;

use alebaz_domain::model::PaymentReference;
use alebaz_payments::gateway::GatewayError;
use alebaz_payments::reconcile::{reconcile, ReconcileError, ReconcileOutcome};

use crate::state::AppState;

use super::ApiError;

/// Header the provider signs webhook bodies into.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettlementResponse {
    pub reference: String,
    pub status: String,
}

/// Buyer's browser lands here after checkout. Errors are surfaced to the
/// caller; a 503 invites a retry once the provider is reachable again.
pub async fn callback_handler(
    state: web::Data<AppState>,
    query: web::Query<CallbackQuery>,
) -> Result<HttpResponse, ApiError> {
    let reference = PaymentReference::parse(&query.reference).map_err(|err| {
        counter!("api_callback_requests_total", "status" => "bad_reference").increment(1);
        ApiError::Validation(err.to_string())
    })?;

    let outcome = reconcile(
        state.storage(),
        state.gateway(),
        state.notifier(),
        &reference,
        Utc::now(),
    )
    .await?;

    let status = settlement_label(&outcome);
    counter!("api_callback_requests_total", "status" => status).increment(1);
    Ok(HttpResponse::Ok().json(SettlementResponse {
        reference: reference.into_inner(),
        status: status.to_string(),
    }))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookData {
    pub reference: String,
}

/// Server-to-server delivery from the provider. Anything that redelivery
/// cannot fix is acknowledged 200 so the provider stops retrying; transient
/// failures answer 5xx to request redelivery.
pub async fn webhook_handler(
    state: web::Data<AppState>,
    request: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    if let Some(secret) = state.webhook_secret() {
        let signature = request
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        if !signature.is_some_and(|sig| signature_valid(secret, &body, sig)) {
            counter!("api_webhook_events_total", "status" => "bad_signature").increment(1);
            return Ok(HttpResponse::Unauthorized().finish());
        }
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(%err, "unparseable webhook payload");
            counter!("api_webhook_events_total", "status" => "malformed").increment(1);
            return Ok(acknowledge("ignored"));
        }
    };

    if event.event != "charge.success" {
        counter!("api_webhook_events_total", "status" => "ignored_event").increment(1);
        return Ok(acknowledge("ignored"));
    }

    let reference = match PaymentReference::parse(&event.data.reference) {
        Ok(reference) => reference,
        Err(err) => {
            warn!(reference = %event.data.reference, %err, "webhook carried a foreign reference");
            counter!("api_webhook_events_total", "status" => "bad_reference").increment(1);
            return Ok(acknowledge("ignored"));
        }
    };

    match reconcile(
        state.storage(),
        state.gateway(),
        state.notifier(),
        &reference,
        Utc::now(),
    )
    .await
    {
        Ok(outcome) => {
            let status = settlement_label(&outcome);
            counter!("api_webhook_events_total", "status" => status).increment(1);
            Ok(acknowledge(status))
        }
        // Redelivery won't conjure the row; stop the retries.
        Err(ReconcileError::NotFound(_)) => {
            counter!("api_webhook_events_total", "status" => "not_found").increment(1);
            Ok(acknowledge("acknowledged"))
        }
        // Logged by the reconciler; acknowledged and left for manual review.
        Err(ReconcileError::AmountMismatch { .. }) | Err(ReconcileError::BadMetadata(_)) => {
            counter!("api_webhook_events_total", "status" => "mismatch").increment(1);
            Ok(acknowledge("acknowledged"))
        }
        Err(ReconcileError::Gateway(GatewayError::Unavailable(_))) => {
            counter!("api_webhook_events_total", "status" => "gateway_unavailable").increment(1);
            Err(ApiError::GatewayUnavailable)
        }
        // The provider answered, just not usably; redelivery would get the
        // same answer. Left for manual review.
        Err(ReconcileError::Gateway(GatewayError::Protocol(detail))) => {
            warn!(reference = %event.data.reference, %detail, "unusable provider response");
            counter!("api_webhook_events_total", "status" => "protocol").increment(1);
            Ok(acknowledge("acknowledged"))
        }
        Err(err) => {
            counter!("api_webhook_events_total", "status" => "error").increment(1);
            Err(err.into())
        }
    }
}

fn acknowledge(status: &str) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": status }))
}

fn settlement_label(outcome: &ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Applied => "applied",
        ReconcileOutcome::AlreadyApplied => "already_applied",
        ReconcileOutcome::Declined { .. } => "declined",
        ReconcileOutcome::Blocked { .. } => "blocked",
    }
}

fn signature_valid(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha512>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    match hex::decode(signature.trim()) {
        Ok(claimed) => mac.verify_slice(&claimed).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
pub(crate) fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha512>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign_body("whsec_123", body);
        assert!(signature_valid("whsec_123", body, &signature));
        assert!(!signature_valid("whsec_456", body, &signature));
        assert!(!signature_valid("whsec_123", b"tampered", &signature));
        assert!(!signature_valid("whsec_123", body, "not-hex"));
    }
}

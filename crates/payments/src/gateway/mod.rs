//! HTTP client for the card-payment gateway. The provider exposes a
//! checkout-initialization endpoint and a transaction-verification endpoint;
//! both wrap their payloads in a `{status, message, data}` envelope.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use alebaz_domain::model::PaymentReference;

mod types;

pub(crate) use types::{GatewayEnvelope, VerifyData};
pub use types::{InitializeRequest, InitializedTransaction, VerifyOutcome};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure or provider 5xx. Callers may retry; webhook
    /// deliveries answer 503 so the provider redelivers.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
    /// The provider answered, but not in a shape we can act on.
    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

/// Seam for the payment provider. Production talks HTTP; tests substitute a
/// scripted fake.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializedTransaction, GatewayError>;

    /// Asks the provider for the authoritative state of a transaction.
    /// Reconciliation never trusts callback or webhook payloads over this.
    async fn verify(&self, reference: &PaymentReference) -> Result<VerifyOutcome, GatewayError>;
}

pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, secret_key: &str) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    async fn parse_envelope<T>(response: reqwest::Response) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::Unavailable(format!(
                "provider answered {status}"
            )));
        }

        let envelope: GatewayEnvelope<T> = response
            .json()
            .await
            .map_err(|err| GatewayError::Protocol(err.to_string()))?;

        if !envelope.status {
            return Err(GatewayError::Protocol(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::Protocol("envelope carried no data".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializedTransaction, GatewayError> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;

        Self::parse_envelope(response).await
    }

    async fn verify(&self, reference: &PaymentReference) -> Result<VerifyOutcome, GatewayError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference.as_str());

        // Verification is a read; one retry covers transient transport blips
        // without risking duplicate side effects.
        let mut last_err = None;
        for attempt in 0..2 {
            match self
                .client
                .get(&url)
                .bearer_auth(&self.secret_key)
                .send()
                .await
            {
                Ok(response) => {
                    let data: VerifyData = Self::parse_envelope(response).await?;
                    return Ok(data.into());
                }
                Err(err) => {
                    warn!(attempt, reference = reference.as_str(), %err, "gateway verify failed");
                    last_err = Some(err);
                }
            }
        }

        Err(GatewayError::Unavailable(
            last_err
                .map(|err| err.to_string())
                .unwrap_or_else(|| "verify retries exhausted".to_string()),
        ))
    }
}

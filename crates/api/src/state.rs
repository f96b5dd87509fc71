use std::sync::Arc;

use alebaz_domain::services::{
    notifier::SellerNotifier, ratings::RatingSource, telemetry::TelemetryGuard,
};
use alebaz_payments::gateway::PaymentGateway;
use alebaz_storage::SeaOrmStorage;

#[derive(Clone)]
pub struct AppState {
    storage: SeaOrmStorage,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn SellerNotifier>,
    ratings: Arc<dyn RatingSource>,
    telemetry: TelemetryGuard,
    payment_callback_url: String,
    webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(
        storage: SeaOrmStorage,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn SellerNotifier>,
        ratings: Arc<dyn RatingSource>,
        telemetry: TelemetryGuard,
        payment_callback_url: String,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            storage,
            gateway,
            notifier,
            ratings,
            telemetry,
            payment_callback_url,
            webhook_secret,
        }
    }

    pub fn storage(&self) -> &SeaOrmStorage {
        &self.storage
    }

    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.gateway.as_ref()
    }

    pub fn notifier(&self) -> &dyn SellerNotifier {
        self.notifier.as_ref()
    }

    pub fn ratings(&self) -> &dyn RatingSource {
        self.ratings.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }

    pub fn payment_callback_url(&self) -> &str {
        &self.payment_callback_url
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }
}

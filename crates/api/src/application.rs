use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use thiserror::Error;

use alebaz_domain::config::{ApiConfig, ConfigError};
use alebaz_domain::services::{
    notifier::TracingNotifier,
    ratings::NoRatings,
    telemetry::{init_telemetry, TelemetryConfig, TelemetryError},
};
use alebaz_payments::gateway::{GatewayError, HttpPaymentGateway};
use alebaz_storage::SeaOrmStorage;

use crate::{
    handlers::{
        approve_promotion_handler, callback_handler, featured_handler,
        initiate_subscription_handler, initiate_verification_handler, metrics_handler,
        submit_promotion_handler, webhook_handler,
    },
    state::AppState,
};

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    let storage = SeaOrmStorage::connect(config.database_url()).await?;
    let gateway = HttpPaymentGateway::new(config.gateway_base_url(), config.gateway_secret_key())?;

    let state = AppState::new(
        storage,
        Arc::new(gateway),
        Arc::new(TracingNotifier),
        Arc::new(NoRatings),
        telemetry,
        config.payment_callback_url().to_string(),
        config.webhook_secret().map(str::to_string),
    );

    // With an internal listener, metrics and admin approval stay off the
    // public surface.
    let include_metrics_on_public = !config.has_internal_listener();
    let include_admin_on_public = !config.has_internal_listener();

    let public_state = state.clone();
    let public_server = HttpServer::new(move || {
        let mut app = App::new()
            .app_data(web::Data::new(public_state.clone()))
            .wrap(Logger::default())
            .route("/api/v1/promotions", web::post().to(submit_promotion_handler))
            .route("/api/v1/promotions/featured", web::get().to(featured_handler))
            .route(
                "/api/v1/verifications",
                web::post().to(initiate_verification_handler),
            )
            .route(
                "/api/v1/subscriptions",
                web::post().to(initiate_subscription_handler),
            )
            .route("/api/v1/payments/callback", web::get().to(callback_handler))
            .route("/api/v1/payments/webhook", web::post().to(webhook_handler));

        if include_metrics_on_public {
            app = app.route("/metrics", web::get().to(metrics_handler));
        }
        if include_admin_on_public {
            app = app.route(
                "/api/v1/promotions/{id}/approve",
                web::post().to(approve_promotion_handler),
            );
        }

        app
    })
    .bind(config.api_bind_address())?
    .run();

    let internal_server = match config.internal_bind_address() {
        Some(addr) => {
            let internal_state = state.clone();
            Some(
                HttpServer::new(move || {
                    App::new()
                        .app_data(web::Data::new(internal_state.clone()))
                        .wrap(Logger::default())
                        .route("/metrics", web::get().to(metrics_handler))
                        .route(
                            "/api/v1/promotions/{id}/approve",
                            web::post().to(approve_promotion_handler),
                        )
                })
                .bind(addr)?
                .run(),
            )
        }
        None => None,
    };

    if let Some(internal) = internal_server {
        tokio::try_join!(public_server, internal)?;
    } else {
        public_server.await?;
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("storage error: {0}")]
    Storage(#[from] alebaz_domain::storage::StorageError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

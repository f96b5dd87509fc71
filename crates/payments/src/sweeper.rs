//! Periodic expiry sweep across the three ledgers. Each pass is a set of
//! idempotent bulk updates, so overlapping or repeated runs are harmless.

use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

use alebaz_domain::config::{ConfigError, SweeperConfig};
use alebaz_domain::services::telemetry::TelemetryError;
use alebaz_domain::storage::{
    PromotionStore, StorageError, SubscriptionStore, VerificationStore,
};
use alebaz_storage::SeaOrmStorage;

#[derive(Debug, Error)]
pub enum SweeperError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Counts of rows each pass flipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub promotions_expired: u64,
    pub subscriptions_expired: u64,
    pub verifications_lapsed: u64,
}

impl SweepReport {
    pub fn total(&self) -> u64 {
        self.promotions_expired + self.subscriptions_expired + self.verifications_lapsed
    }
}

/// One sweep over every ledger at the given instant.
pub async fn sweep_once<S>(storage: &S, now: DateTime<Utc>) -> Result<SweepReport, SweeperError>
where
    S: PromotionStore + SubscriptionStore + VerificationStore,
{
    let report = SweepReport {
        promotions_expired: storage.expire_due_promotions(now).await?,
        subscriptions_expired: storage.expire_due_subscriptions(now).await?,
        verifications_lapsed: storage.lapse_expired_verifications(now).await?,
    };

    counter!("sweeper_rows_expired_total", "ledger" => "promotions")
        .increment(report.promotions_expired);
    counter!("sweeper_rows_expired_total", "ledger" => "subscriptions")
        .increment(report.subscriptions_expired);
    counter!("sweeper_rows_expired_total", "ledger" => "verifications")
        .increment(report.verifications_lapsed);
    gauge!("sweeper_last_run_unix_seconds").set(now.timestamp() as f64);

    Ok(report)
}

/// Sweep loop: runs forever at the configured cadence.
pub async fn run_sweeper(
    config: SweeperConfig,
    storage: SeaOrmStorage,
) -> Result<(), SweeperError> {
    let cadence = Duration::from_secs(config.sweep_interval_secs());
    info!(interval_secs = config.sweep_interval_secs(), "sweeper started");

    loop {
        let report = sweep_once(&storage, Utc::now()).await?;
        if report.total() > 0 {
            info!(
                promotions = report.promotions_expired,
                subscriptions = report.subscriptions_expired,
                verifications = report.verifications_lapsed,
                "expiry sweep applied"
            );
        }
        sleep(cadence).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;

    use alebaz_domain::model::{
        ActivationOutcome, ApprovalOutcome, FeaturedSeller, NewPromotion, NewVerification,
        PaymentReference, PromotionRecord, SellerId, SubmitOutcome, SubscriptionRecord,
        VerificationRecord,
    };
    use alebaz_domain::storage::StorageResult;

    /// Each ledger hands out its pending count once, then reports clean.
    #[derive(Default)]
    struct DrainOnce {
        promotions: AtomicU64,
        subscriptions: AtomicU64,
        verifications: AtomicU64,
    }

    impl DrainOnce {
        fn with_due(promotions: u64, subscriptions: u64, verifications: u64) -> Self {
            Self {
                promotions: AtomicU64::new(promotions),
                subscriptions: AtomicU64::new(subscriptions),
                verifications: AtomicU64::new(verifications),
            }
        }
    }

    #[async_trait]
    impl PromotionStore for DrainOnce {
        async fn submit_promotion(&self, _p: NewPromotion) -> StorageResult<SubmitOutcome> {
            unimplemented!()
        }
        async fn approve_promotion(
            &self,
            _id: i64,
            _now: DateTime<Utc>,
        ) -> StorageResult<Option<ApprovalOutcome>> {
            unimplemented!()
        }
        async fn find_promotion_by_reference(
            &self,
            _reference: &PaymentReference,
        ) -> StorageResult<Option<PromotionRecord>> {
            unimplemented!()
        }
        async fn activate_promotion(
            &self,
            _reference: &PaymentReference,
            _now: DateTime<Utc>,
        ) -> StorageResult<Option<ActivationOutcome>> {
            unimplemented!()
        }
        async fn list_featured(&self, _now: DateTime<Utc>) -> StorageResult<Vec<FeaturedSeller>> {
            unimplemented!()
        }
        async fn expire_due_promotions(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
            Ok(self.promotions.swap(0, Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl SubscriptionStore for DrainOnce {
        async fn find_subscription(
            &self,
            _seller: &SellerId,
        ) -> StorageResult<Option<SubscriptionRecord>> {
            unimplemented!()
        }
        async fn renew_subscription(
            &self,
            _seller: &SellerId,
            _reference: &PaymentReference,
            _now: DateTime<Utc>,
        ) -> StorageResult<SubscriptionRecord> {
            unimplemented!()
        }
        async fn expire_due_subscriptions(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
            Ok(self.subscriptions.swap(0, Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl VerificationStore for DrainOnce {
        async fn create_verification(
            &self,
            _v: NewVerification,
        ) -> StorageResult<VerificationRecord> {
            unimplemented!()
        }
        async fn find_verification_by_reference(
            &self,
            _reference: &PaymentReference,
        ) -> StorageResult<Option<VerificationRecord>> {
            unimplemented!()
        }
        async fn confirm_verification(
            &self,
            _reference: &PaymentReference,
            _now: DateTime<Utc>,
        ) -> StorageResult<Option<VerificationRecord>> {
            unimplemented!()
        }
        async fn fail_verification(
            &self,
            _reference: &PaymentReference,
        ) -> StorageResult<Option<VerificationRecord>> {
            unimplemented!()
        }
        async fn lapse_expired_verifications(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
            Ok(self.verifications.swap(0, Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn sweep_reports_per_ledger_counts_and_drains_to_zero() {
        let storage = DrainOnce::with_due(3, 1, 2);
        let now = Utc::now();

        let first = sweep_once(&storage, now).await.unwrap();
        assert_eq!(
            first,
            SweepReport {
                promotions_expired: 3,
                subscriptions_expired: 1,
                verifications_lapsed: 2,
            }
        );
        assert_eq!(first.total(), 6);

        let second = sweep_once(&storage, now).await.unwrap();
        assert_eq!(second, SweepReport::default());
    }
}

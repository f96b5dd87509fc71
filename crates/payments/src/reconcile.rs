//! Reconciliation of gateway payments against the ledgers. Both delivery
//! transports (the buyer's browser callback and the provider webhook) funnel
//! into [`reconcile`], so arrival order does not matter and replays converge
//! on the already-applied state.

use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use alebaz_domain::model::{
    ActivationOutcome, PaymentReference, ReferenceKind, SellerId, VerificationStatus,
};
use alebaz_domain::plan::{validity_window, SUBSCRIPTION_YEARLY_PRICE_MINOR};
use alebaz_domain::services::notifier::{notify_best_effort, SellerEvent, SellerNotifier};
use alebaz_domain::storage::{
    PromotionStore, SellerStore, StorageError, SubscriptionStore, VerificationStore,
};

use crate::gateway::{GatewayError, PaymentGateway, VerifyOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The ledger moved and the seller was notified.
    Applied,
    /// Another delivery got here first; nothing changed.
    AlreadyApplied,
    /// The provider reports a non-success terminal state.
    Declined { raw_status: String },
    /// The payment settled but another promotion already holds the seller's
    /// slot; the row stays pending, flagged for manual review.
    Blocked { active_until: DateTime<Utc> },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no ledger row matches reference `{0}`")]
    NotFound(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Provider-reported amount disagrees with the ledger. The row is left
    /// untouched for manual review.
    #[error("amount mismatch: ledger expects {expected}, provider reports {reported}")]
    AmountMismatch { expected: i64, reported: i64 },
    #[error("unusable transaction metadata: {0}")]
    BadMetadata(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Settles one payment reference against its ledger. Safe to call any number
/// of times per reference; exactly one call applies the change.
pub async fn reconcile<S, G, N>(
    storage: &S,
    gateway: &G,
    notifier: &N,
    reference: &PaymentReference,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: PromotionStore + VerificationStore + SubscriptionStore + SellerStore,
    G: PaymentGateway + ?Sized,
    N: SellerNotifier + ?Sized,
{
    let outcome = match reference.kind() {
        ReferenceKind::Promotion => reconcile_promotion(storage, gateway, notifier, reference, now).await,
        ReferenceKind::Verification => {
            reconcile_verification(storage, gateway, notifier, reference, now).await
        }
        ReferenceKind::Subscription => {
            reconcile_subscription(storage, gateway, notifier, reference, now).await
        }
    };

    let ledger = ledger_label(reference.kind());
    match &outcome {
        Ok(result) => {
            counter!("reconcile_total", "ledger" => ledger, "outcome" => outcome_label(result))
                .increment(1);
        }
        Err(err) => {
            counter!("reconcile_total", "ledger" => ledger, "outcome" => "error").increment(1);
            warn!(reference = reference.as_str(), %err, "reconciliation failed");
        }
    }
    outcome
}

async fn reconcile_promotion<S, G, N>(
    storage: &S,
    gateway: &G,
    notifier: &N,
    reference: &PaymentReference,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: PromotionStore,
    G: PaymentGateway + ?Sized,
    N: SellerNotifier + ?Sized,
{
    let Some(record) = storage.find_promotion_by_reference(reference).await? else {
        return Err(ReconcileError::NotFound(reference.as_str().to_string()));
    };
    if record.active {
        return Ok(ReconcileOutcome::AlreadyApplied);
    }

    let verified = gateway.verify(reference).await?;
    if !verified.success {
        return Ok(ReconcileOutcome::Declined {
            raw_status: verified.raw_status,
        });
    }
    check_amount(record.amount_minor, &verified)?;

    match storage.activate_promotion(reference, now).await? {
        Some(ActivationOutcome::Activated(activated)) => {
            info!(
                seller = activated.seller.get(),
                plan = %activated.plan,
                reference = reference.as_str(),
                "promotion activated"
            );
            notify_best_effort(
                notifier,
                activated.seller,
                SellerEvent::PromotionActivated {
                    plan: activated.plan,
                    ends_at: activated.ends_at,
                },
            )
            .await;
            Ok(ReconcileOutcome::Applied)
        }
        Some(ActivationOutcome::Blocked { ends_at }) => {
            warn!(
                reference = reference.as_str(),
                active_until = %ends_at,
                "settled payment blocked by a live promotion"
            );
            Ok(ReconcileOutcome::Blocked {
                active_until: ends_at,
            })
        }
        // Lost the race to the other transport.
        Some(ActivationOutcome::AlreadyActive(_)) | None => Ok(ReconcileOutcome::AlreadyApplied),
    }
}

async fn reconcile_verification<S, G, N>(
    storage: &S,
    gateway: &G,
    notifier: &N,
    reference: &PaymentReference,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: VerificationStore,
    G: PaymentGateway + ?Sized,
    N: SellerNotifier + ?Sized,
{
    let Some(record) = storage.find_verification_by_reference(reference).await? else {
        return Err(ReconcileError::NotFound(reference.as_str().to_string()));
    };
    match record.status {
        VerificationStatus::Success => return Ok(ReconcileOutcome::AlreadyApplied),
        VerificationStatus::Failed => {
            return Ok(ReconcileOutcome::Declined {
                raw_status: "failed".to_string(),
            })
        }
        VerificationStatus::Pending => {}
    }

    let verified = gateway.verify(reference).await?;
    if !verified.success {
        storage.fail_verification(reference).await?;
        return Ok(ReconcileOutcome::Declined {
            raw_status: verified.raw_status,
        });
    }
    check_amount(record.amount_minor, &verified)?;

    match storage.confirm_verification(reference, now).await? {
        Some(confirmed) => {
            let expires_at = confirmed.expires_at.unwrap_or_else(|| now + validity_window());
            info!(
                seller = confirmed.seller.get(),
                reference = reference.as_str(),
                "verification confirmed"
            );
            notify_best_effort(
                notifier,
                confirmed.seller,
                SellerEvent::VerificationConfirmed { expires_at },
            )
            .await;
            Ok(ReconcileOutcome::Applied)
        }
        None => Ok(ReconcileOutcome::AlreadyApplied),
    }
}

async fn reconcile_subscription<S, G, N>(
    storage: &S,
    gateway: &G,
    notifier: &N,
    reference: &PaymentReference,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: SubscriptionStore + SellerStore,
    G: PaymentGateway + ?Sized,
    N: SellerNotifier + ?Sized,
{
    // The subscription row only exists after the first settlement, so the
    // paying seller travels in the transaction metadata.
    let verified = gateway.verify(reference).await?;
    if !verified.success {
        return Ok(ReconcileOutcome::Declined {
            raw_status: verified.raw_status,
        });
    }
    check_amount(SUBSCRIPTION_YEARLY_PRICE_MINOR, &verified)?;

    let seller = seller_from_metadata(&verified)?;
    if storage.find_seller(&seller).await?.is_none() {
        return Err(ReconcileError::NotFound(reference.as_str().to_string()));
    }

    if let Some(existing) = storage.find_subscription(&seller).await? {
        if existing.reference.as_ref() == Some(reference) {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }
    }

    let renewed = storage.renew_subscription(&seller, reference, now).await?;
    info!(
        seller = seller.get(),
        reference = reference.as_str(),
        expires_at = %renewed.expires_at,
        "subscription renewed"
    );
    notify_best_effort(
        notifier,
        seller,
        SellerEvent::SubscriptionRenewed {
            expires_at: renewed.expires_at,
        },
    )
    .await;
    Ok(ReconcileOutcome::Applied)
}

fn check_amount(expected: i64, verified: &VerifyOutcome) -> Result<(), ReconcileError> {
    if verified.amount_minor != expected {
        return Err(ReconcileError::AmountMismatch {
            expected,
            reported: verified.amount_minor,
        });
    }
    Ok(())
}

fn seller_from_metadata(verified: &VerifyOutcome) -> Result<SellerId, ReconcileError> {
    verified
        .metadata
        .get("seller_id")
        .and_then(serde_json::Value::as_i64)
        .map(SellerId::new)
        .ok_or_else(|| ReconcileError::BadMetadata("metadata lacks a seller_id".to_string()))
}

fn ledger_label(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Promotion => "promotion",
        ReferenceKind::Verification => "verification",
        ReferenceKind::Subscription => "subscription",
    }
}

fn outcome_label(outcome: &ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Applied => "applied",
        ReconcileOutcome::AlreadyApplied => "already_applied",
        ReconcileOutcome::Declined { .. } => "declined",
        ReconcileOutcome::Blocked { .. } => "blocked",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use alebaz_domain::model::{
        ApprovalOutcome, FeaturedSeller, NewPromotion, NewVerification, PaymentMethod, PlanName,
        PromotionRecord, SellerProfile, SubmitOutcome, SubscriptionRecord, VerificationRecord,
    };
    use alebaz_domain::plan::SUBSCRIPTION_PLAN;
    use alebaz_domain::services::notifier::NotifyError;
    use alebaz_domain::storage::StorageResult;
    use crate::gateway::{InitializeRequest, InitializedTransaction};

    #[derive(Default)]
    struct MemStorage {
        promotions: Mutex<Vec<PromotionRecord>>,
        verifications: Mutex<Vec<VerificationRecord>>,
        subscriptions: Mutex<HashMap<i64, SubscriptionRecord>>,
        sellers: Mutex<HashMap<i64, SellerProfile>>,
    }

    #[async_trait]
    impl PromotionStore for MemStorage {
        async fn submit_promotion(&self, promotion: NewPromotion) -> StorageResult<SubmitOutcome> {
            let mut rows = self.promotions.lock().unwrap();
            let id = rows.len() as i64 + 1;
            let record = PromotionRecord {
                id,
                seller: promotion.seller,
                plan: promotion.plan,
                duration_days: promotion.duration_days,
                starts_at: promotion.starts_at,
                ends_at: promotion.ends_at,
                active: promotion.active,
                approved: promotion.approved,
                payment_method: promotion.payment_method,
                reference: promotion.reference,
                proof_hash: promotion.proof_hash,
                amount_minor: promotion.amount_minor,
                approved_at: None,
                expired_at: None,
                created_at: promotion.starts_at,
            };
            rows.push(record.clone());
            Ok(SubmitOutcome::Created(record))
        }

        async fn approve_promotion(
            &self,
            _id: i64,
            _now: DateTime<Utc>,
        ) -> StorageResult<Option<ApprovalOutcome>> {
            Ok(None)
        }

        async fn find_promotion_by_reference(
            &self,
            reference: &PaymentReference,
        ) -> StorageResult<Option<PromotionRecord>> {
            let rows = self.promotions.lock().unwrap();
            Ok(rows
                .iter()
                .find(|row| row.reference.as_ref() == Some(reference))
                .cloned())
        }

        async fn activate_promotion(
            &self,
            reference: &PaymentReference,
            now: DateTime<Utc>,
        ) -> StorageResult<Option<ActivationOutcome>> {
            let mut rows = self.promotions.lock().unwrap();
            let Some(index) = rows
                .iter()
                .position(|row| row.reference.as_ref() == Some(reference))
            else {
                return Ok(None);
            };
            if rows[index].active {
                return Ok(Some(ActivationOutcome::AlreadyActive(rows[index].clone())));
            }
            let seller = rows[index].seller;
            if let Some(blocking) = rows
                .iter()
                .find(|row| row.seller == seller && row.active && row.ends_at > now)
            {
                return Ok(Some(ActivationOutcome::Blocked {
                    ends_at: blocking.ends_at,
                }));
            }
            let row = &mut rows[index];
            row.active = true;
            row.approved = true;
            row.approved_at = Some(now);
            Ok(Some(ActivationOutcome::Activated(row.clone())))
        }

        async fn list_featured(&self, _now: DateTime<Utc>) -> StorageResult<Vec<FeaturedSeller>> {
            Ok(Vec::new())
        }

        async fn expire_due_promotions(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
            Ok(0)
        }
    }

    #[async_trait]
    impl VerificationStore for MemStorage {
        async fn create_verification(
            &self,
            verification: NewVerification,
        ) -> StorageResult<VerificationRecord> {
            let mut rows = self.verifications.lock().unwrap();
            let record = VerificationRecord {
                id: rows.len() as i64 + 1,
                seller: verification.seller,
                reference: verification.reference,
                amount_minor: verification.amount_minor,
                status: VerificationStatus::Pending,
                starts_at: None,
                ends_at: None,
                expires_at: None,
                paid_at: None,
                created_at: verification.created_at,
            };
            rows.push(record.clone());
            Ok(record)
        }

        async fn find_verification_by_reference(
            &self,
            reference: &PaymentReference,
        ) -> StorageResult<Option<VerificationRecord>> {
            let rows = self.verifications.lock().unwrap();
            Ok(rows.iter().find(|row| &row.reference == reference).cloned())
        }

        async fn confirm_verification(
            &self,
            reference: &PaymentReference,
            now: DateTime<Utc>,
        ) -> StorageResult<Option<VerificationRecord>> {
            let mut rows = self.verifications.lock().unwrap();
            let Some(row) = rows.iter_mut().find(|row| {
                &row.reference == reference && row.status == VerificationStatus::Pending
            }) else {
                return Ok(None);
            };
            row.status = VerificationStatus::Success;
            row.paid_at = Some(now);
            row.starts_at = Some(now);
            row.ends_at = Some(now + validity_window());
            row.expires_at = row.ends_at;
            let seller = row.seller;
            let updated = row.clone();
            drop(rows);
            if let Some(profile) = self.sellers.lock().unwrap().get_mut(&seller.get()) {
                profile.verified = true;
            }
            Ok(Some(updated))
        }

        async fn fail_verification(
            &self,
            reference: &PaymentReference,
        ) -> StorageResult<Option<VerificationRecord>> {
            let mut rows = self.verifications.lock().unwrap();
            let Some(row) = rows.iter_mut().find(|row| {
                &row.reference == reference && row.status == VerificationStatus::Pending
            }) else {
                return Ok(None);
            };
            row.status = VerificationStatus::Failed;
            Ok(Some(row.clone()))
        }

        async fn lapse_expired_verifications(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
            Ok(0)
        }
    }

    #[async_trait]
    impl SubscriptionStore for MemStorage {
        async fn find_subscription(
            &self,
            seller: &SellerId,
        ) -> StorageResult<Option<SubscriptionRecord>> {
            Ok(self.subscriptions.lock().unwrap().get(&seller.get()).cloned())
        }

        async fn renew_subscription(
            &self,
            seller: &SellerId,
            reference: &PaymentReference,
            now: DateTime<Utc>,
        ) -> StorageResult<SubscriptionRecord> {
            let record = SubscriptionRecord {
                seller: *seller,
                plan: SUBSCRIPTION_PLAN.to_string(),
                starts_at: now,
                expires_at: now + validity_window(),
                active: true,
                reference: Some(reference.clone()),
            };
            self.subscriptions
                .lock()
                .unwrap()
                .insert(seller.get(), record.clone());
            Ok(record)
        }

        async fn expire_due_subscriptions(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
            Ok(0)
        }
    }

    #[async_trait]
    impl SellerStore for MemStorage {
        async fn find_seller(&self, seller: &SellerId) -> StorageResult<Option<SellerProfile>> {
            Ok(self.sellers.lock().unwrap().get(&seller.get()).cloned())
        }

        async fn upsert_seller(&self, profile: SellerProfile) -> StorageResult<()> {
            self.sellers
                .lock()
                .unwrap()
                .insert(profile.id.get(), profile);
            Ok(())
        }
    }

    /// Gateway scripted per reference.
    #[derive(Default)]
    struct ScriptedGateway {
        outcomes: Mutex<HashMap<String, VerifyOutcome>>,
        unavailable: bool,
    }

    impl ScriptedGateway {
        fn script(&self, reference: &PaymentReference, outcome: VerifyOutcome) {
            self.outcomes
                .lock()
                .unwrap()
                .insert(reference.as_str().to_string(), outcome);
        }
    }

    #[async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn initialize(
            &self,
            _request: InitializeRequest,
        ) -> Result<InitializedTransaction, GatewayError> {
            Err(GatewayError::Protocol("not scripted".to_string()))
        }

        async fn verify(
            &self,
            reference: &PaymentReference,
        ) -> Result<VerifyOutcome, GatewayError> {
            if self.unavailable {
                return Err(GatewayError::Unavailable("scripted outage".to_string()));
            }
            self.outcomes
                .lock()
                .unwrap()
                .get(reference.as_str())
                .cloned()
                .ok_or_else(|| GatewayError::Protocol("reference not found".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        delivered: AtomicUsize,
        events: Mutex<Vec<SellerEvent>>,
    }

    #[async_trait]
    impl SellerNotifier for CountingNotifier {
        async fn notify(&self, _seller: SellerId, event: SellerEvent) -> Result<(), NotifyError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn success(amount_minor: i64) -> VerifyOutcome {
        VerifyOutcome {
            success: true,
            raw_status: "success".to_string(),
            amount_minor,
            metadata: serde_json::Value::Null,
        }
    }

    async fn seed_seller(storage: &MemStorage, id: i64) -> SellerId {
        let seller = SellerId::new(id);
        storage
            .upsert_seller(SellerProfile {
                id: seller,
                email: format!("seller{id}@example.test"),
                shop_name: format!("Shop {id}"),
                verified: false,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        seller
    }

    async fn seed_pending_promotion(
        storage: &MemStorage,
        seller: SellerId,
    ) -> (PaymentReference, i64) {
        let reference = PaymentReference::generate(ReferenceKind::Promotion).unwrap();
        let spec = PlanName::Standard.spec();
        let now = Utc::now();
        storage
            .submit_promotion(NewPromotion {
                seller,
                plan: PlanName::Standard,
                duration_days: spec.duration_days,
                starts_at: now,
                ends_at: now + chrono::Duration::days(spec.duration_days as i64),
                payment_method: PaymentMethod::Gateway,
                reference: Some(reference.clone()),
                proof_hash: None,
                amount_minor: spec.price_minor,
                active: false,
                approved: false,
            })
            .await
            .unwrap();
        (reference, spec.price_minor)
    }

    #[tokio::test]
    async fn promotion_settles_once_across_both_transports() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let seller = seed_seller(&storage, 1).await;
        let (reference, amount) = seed_pending_promotion(&storage, seller).await;
        gateway.script(&reference, success(amount));

        let now = Utc::now();
        let first = reconcile(&storage, &gateway, &notifier, &reference, now)
            .await
            .unwrap();
        assert_eq!(first, ReconcileOutcome::Applied);

        // webhook replay after the callback already applied it
        let second = reconcile(&storage, &gateway, &notifier, &reference, now)
            .await
            .unwrap();
        assert_eq!(second, ReconcileOutcome::AlreadyApplied);

        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);
        let record = storage
            .find_promotion_by_reference(&reference)
            .await
            .unwrap()
            .unwrap();
        assert!(record.active && record.approved);
    }

    #[tokio::test]
    async fn a_second_settled_payment_cannot_stack_promotions() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let seller = seed_seller(&storage, 9).await;
        let (first_ref, first_amount) = seed_pending_promotion(&storage, seller).await;
        let (second_ref, second_amount) = seed_pending_promotion(&storage, seller).await;
        gateway.script(&first_ref, success(first_amount));
        gateway.script(&second_ref, success(second_amount));

        let now = Utc::now();
        let first = reconcile(&storage, &gateway, &notifier, &first_ref, now)
            .await
            .unwrap();
        assert_eq!(first, ReconcileOutcome::Applied);

        let second = reconcile(&storage, &gateway, &notifier, &second_ref, now)
            .await
            .unwrap();
        assert!(matches!(second, ReconcileOutcome::Blocked { .. }));

        // the blocked row stays pending and the seller hears nothing about it
        let record = storage
            .find_promotion_by_reference(&second_ref)
            .await
            .unwrap()
            .unwrap();
        assert!(!record.active);
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn declined_promotion_payment_leaves_the_row_pending() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let seller = seed_seller(&storage, 2).await;
        let (reference, amount) = seed_pending_promotion(&storage, seller).await;
        gateway.script(
            &reference,
            VerifyOutcome {
                success: false,
                raw_status: "abandoned".to_string(),
                amount_minor: amount,
                metadata: serde_json::Value::Null,
            },
        );

        let outcome = reconcile(&storage, &gateway, &notifier, &reference, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Declined {
                raw_status: "abandoned".to_string()
            }
        );
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 0);
        let record = storage
            .find_promotion_by_reference(&reference)
            .await
            .unwrap()
            .unwrap();
        assert!(!record.active);
    }

    #[tokio::test]
    async fn amount_mismatch_is_surfaced_without_mutating() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let seller = seed_seller(&storage, 3).await;
        let (reference, amount) = seed_pending_promotion(&storage, seller).await;
        gateway.script(&reference, success(amount - 1));

        let err = reconcile(&storage, &gateway, &notifier, &reference, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::AmountMismatch { expected, reported }
                if expected == amount && reported == amount - 1
        ));
        let record = storage
            .find_promotion_by_reference(&reference)
            .await
            .unwrap()
            .unwrap();
        assert!(!record.active);
    }

    #[tokio::test]
    async fn unknown_promotion_reference_is_not_found() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let reference = PaymentReference::generate(ReferenceKind::Promotion).unwrap();

        let err = reconcile(&storage, &gateway, &notifier, &reference, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::NotFound(_)));
    }

    #[tokio::test]
    async fn gateway_outage_is_retryable_and_changes_nothing() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway {
            unavailable: true,
            ..ScriptedGateway::default()
        };
        let notifier = CountingNotifier::default();
        let seller = seed_seller(&storage, 4).await;
        let (reference, _) = seed_pending_promotion(&storage, seller).await;

        let err = reconcile(&storage, &gateway, &notifier, &reference, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Gateway(GatewayError::Unavailable(_))
        ));
        let record = storage
            .find_promotion_by_reference(&reference)
            .await
            .unwrap()
            .unwrap();
        assert!(!record.active);
    }

    #[tokio::test]
    async fn verification_confirms_once_and_flags_the_seller() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let seller = seed_seller(&storage, 5).await;
        let reference = PaymentReference::generate(ReferenceKind::Verification).unwrap();
        storage
            .create_verification(NewVerification {
                seller,
                reference: reference.clone(),
                amount_minor: 250_000,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        gateway.script(&reference, success(250_000));

        let now = Utc::now();
        let first = reconcile(&storage, &gateway, &notifier, &reference, now)
            .await
            .unwrap();
        assert_eq!(first, ReconcileOutcome::Applied);
        assert!(storage.find_seller(&seller).await.unwrap().unwrap().verified);

        let second = reconcile(&storage, &gateway, &notifier, &reference, now)
            .await
            .unwrap();
        assert_eq!(second, ReconcileOutcome::AlreadyApplied);
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_verification_payment_marks_the_row_failed() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let seller = seed_seller(&storage, 6).await;
        let reference = PaymentReference::generate(ReferenceKind::Verification).unwrap();
        storage
            .create_verification(NewVerification {
                seller,
                reference: reference.clone(),
                amount_minor: 250_000,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        gateway.script(
            &reference,
            VerifyOutcome {
                success: false,
                raw_status: "failed".to_string(),
                amount_minor: 250_000,
                metadata: serde_json::Value::Null,
            },
        );

        let outcome = reconcile(&storage, &gateway, &notifier, &reference, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Declined {
                raw_status: "failed".to_string()
            }
        );
        let record = storage
            .find_verification_by_reference(&reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, VerificationStatus::Failed);
        assert!(!storage.find_seller(&seller).await.unwrap().unwrap().verified);
    }

    #[tokio::test]
    async fn subscription_renews_from_metadata_and_replays_converge() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let seller = seed_seller(&storage, 7).await;
        let reference = PaymentReference::generate(ReferenceKind::Subscription).unwrap();
        gateway.script(
            &reference,
            VerifyOutcome {
                success: true,
                raw_status: "success".to_string(),
                amount_minor: SUBSCRIPTION_YEARLY_PRICE_MINOR,
                metadata: serde_json::json!({ "seller_id": seller.get() }),
            },
        );

        let now = Utc::now();
        let first = reconcile(&storage, &gateway, &notifier, &reference, now)
            .await
            .unwrap();
        assert_eq!(first, ReconcileOutcome::Applied);

        let second = reconcile(&storage, &gateway, &notifier, &reference, now)
            .await
            .unwrap();
        assert_eq!(second, ReconcileOutcome::AlreadyApplied);
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);

        let subscription = storage.find_subscription(&seller).await.unwrap().unwrap();
        assert!(subscription.active);
        assert_eq!(subscription.reference, Some(reference));
    }

    #[tokio::test]
    async fn subscription_without_seller_metadata_is_rejected() {
        let storage = MemStorage::default();
        let gateway = ScriptedGateway::default();
        let notifier = CountingNotifier::default();
        let reference = PaymentReference::generate(ReferenceKind::Subscription).unwrap();
        gateway.script(&reference, success(SUBSCRIPTION_YEARLY_PRICE_MINOR));

        let err = reconcile(&storage, &gateway, &notifier, &reference, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::BadMetadata(_)));
    }
}

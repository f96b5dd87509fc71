//! Storage seams the ledgers are written against. The SeaORM adapters in
//! `alebaz_storage` implement these; tests substitute in-memory fakes.
//!
//! Every state transition here is expected to be a single atomic conditional
//! statement at the adapter level: callers never hold a lock across a
//! gateway call, and repeated invocations must converge on the same state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    ActivationOutcome, ApprovalOutcome, FeaturedSeller, NewPromotion, NewVerification,
    PaymentReference, PromotionRecord, SellerId, SellerProfile, SubmitOutcome,
    SubscriptionRecord, VerificationRecord,
};

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

/// Promotion ledger: submission guard, activation, approval, expiry.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Inserts a promotion unless the seller already holds one with
    /// `active = true` and an end date in the future. Guard and insert are
    /// one atomic statement.
    async fn submit_promotion(&self, promotion: NewPromotion) -> StorageResult<SubmitOutcome>;

    /// Flips `approved` and `active` together, re-checking the single-active
    /// guard in the same statement. Returns `None` when the id is unknown;
    /// already-approved rows come back as
    /// [`ApprovalOutcome::AlreadyApproved`], and rows blocked by another
    /// live promotion as [`ApprovalOutcome::Blocked`].
    async fn approve_promotion(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<ApprovalOutcome>>;

    async fn find_promotion_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> StorageResult<Option<PromotionRecord>>;

    /// Conditionally activates a gateway-paid promotion after provider
    /// verification, re-checking the single-active guard in the same
    /// statement. Returns `None` when the reference is unknown.
    async fn activate_promotion(
        &self,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<ActivationOutcome>>;

    /// Sellers with an active, approved promotion whose window contains
    /// `now`. Pure read: expired rows are skipped, never mutated here.
    async fn list_featured(&self, now: DateTime<Utc>) -> StorageResult<Vec<FeaturedSeller>>;

    /// Bulk-expires rows with `active = true` and `ends_at < now`. Returns
    /// the affected count; repeat invocations return 0.
    async fn expire_due_promotions(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// Verification ledger: pending rows, the once-only settlement, and the
/// cached seller `verified` flag.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn create_verification(
        &self,
        verification: NewVerification,
    ) -> StorageResult<VerificationRecord>;

    async fn find_verification_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> StorageResult<Option<VerificationRecord>>;

    /// Moves a pending row to `success`, stamps the one-year window, and
    /// flips the seller's `verified` flag in the same transaction. Returns
    /// `None` when no pending row matched.
    async fn confirm_verification(
        &self,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<VerificationRecord>>;

    /// Moves a pending row to `failed`. The seller flag is untouched.
    async fn fail_verification(
        &self,
        reference: &PaymentReference,
    ) -> StorageResult<Option<VerificationRecord>>;

    /// Unsets `verified` for sellers whose only successful verifications
    /// have expired. Returns the affected count.
    async fn lapse_expired_verifications(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// Subscription ledger: one upserted row per seller.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_subscription(
        &self,
        seller: &SellerId,
    ) -> StorageResult<Option<SubscriptionRecord>>;

    /// Creates or renews the seller's yearly subscription: overwrites
    /// `starts_at`/`expires_at` in place and records the paying reference.
    async fn renew_subscription(
        &self,
        seller: &SellerId,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> StorageResult<SubscriptionRecord>;

    /// Same contract as the promotion sweep, applied to
    /// `subscriptions.active` / `expires_at`.
    async fn expire_due_subscriptions(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// Mirrored seller profiles. Registration is external; the engine reads the
/// profile for gateway metadata and owns the `verified` flag.
#[async_trait]
pub trait SellerStore: Send + Sync {
    async fn find_seller(&self, seller: &SellerId) -> StorageResult<Option<SellerProfile>>;

    async fn upsert_seller(&self, profile: SellerProfile) -> StorageResult<()>;
}

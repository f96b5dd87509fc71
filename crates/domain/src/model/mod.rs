//! Data structures shared across the API, payments, and storage crates.

use chrono::{DateTime, Utc};
use hex::encode as hex_encode;
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Number of random bytes behind a freshly minted payment reference.
pub const REFERENCE_TOKEN_BYTES: usize = 12;

/// Internal identifier of a seller. Registration lives outside this system;
/// the engine only references sellers by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SellerId(i64);

impl SellerId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for SellerId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Featured-placement plan tiers. Prices and durations live in
/// [`crate::plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PlanName {
    Basic,
    Standard,
    Premium,
}

/// How a promotion submission is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    Gateway,
    CryptoProof,
}

/// Terminal-once status of a verification payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Success,
    Failed,
}

/// Which ledger owns a payment reference. Encoded as the reference prefix so
/// reconciliation can route without a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Promotion,
    Verification,
    Subscription,
}

impl ReferenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ReferenceKind::Promotion => "ALEBAZ-PRM-",
            ReferenceKind::Verification => "ALEBAZ-SVP-",
            ReferenceKind::Subscription => "ALEBAZ-SUB-",
        }
    }
}

/// Errors emitted when externally supplied references fail validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceFormatError {
    #[error("payment reference carries an unknown prefix")]
    UnknownPrefix,
    #[error("payment reference token must be 1-64 alphanumeric characters")]
    BadToken,
}

/// Failure to draw randomness for a new reference. Practically unreachable,
/// but surfaced instead of panicking in request paths.
#[derive(Debug, Error)]
#[error("entropy source unavailable: {0}")]
pub struct EntropyError(String);

/// Globally unique, prefix-routed payment reference. The reference column is
/// unique at the storage layer and doubles as the reconciliation idempotency
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentReference {
    kind: ReferenceKind,
    value: String,
}

impl PaymentReference {
    /// Mints a collision-resistant reference for the given ledger.
    pub fn generate(kind: ReferenceKind) -> Result<Self, EntropyError> {
        let mut buf = [0u8; REFERENCE_TOKEN_BYTES];
        getrandom::fill(&mut buf).map_err(|err| EntropyError(err.to_string()))?;
        Ok(Self {
            kind,
            value: format!("{}{}", kind.prefix(), hex_encode(buf)),
        })
    }

    /// Validates an externally supplied reference against the prefix scheme.
    pub fn parse(raw: &str) -> Result<Self, ReferenceFormatError> {
        let raw = raw.trim();
        let kind = [
            ReferenceKind::Promotion,
            ReferenceKind::Verification,
            ReferenceKind::Subscription,
        ]
        .into_iter()
        .find(|kind| raw.starts_with(kind.prefix()))
        .ok_or(ReferenceFormatError::UnknownPrefix)?;

        let token = &raw[kind.prefix().len()..];
        if token.is_empty() || token.len() > 64 || !token.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ReferenceFormatError::BadToken);
        }

        Ok(Self {
            kind,
            value: raw.to_string(),
        })
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

impl std::fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// Errors emitted when a manually submitted crypto proof hash is malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofHashError {
    #[error("proof hash must start with 0x")]
    MissingPrefix,
    #[error("proof hash contains non-hex characters")]
    NonHex,
}

/// Validates a `0x`-prefixed transaction hash submitted as crypto payment
/// proof. Case-insensitive; length is provider-specific and not enforced
/// beyond a sanity cap.
pub fn validate_proof_hash(hash: &str) -> Result<(), ProofHashError> {
    let Some(digits) = hash.strip_prefix("0x") else {
        return Err(ProofHashError::MissingPrefix);
    };
    if digits.is_empty() || digits.len() > 128 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProofHashError::NonHex);
    }
    Ok(())
}

/// Seller profile mirrored from the external registration system. The engine
/// owns only the `verified` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerProfile {
    pub id: SellerId,
    pub email: String,
    pub shop_name: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRecord {
    pub id: i64,
    pub seller: SellerId,
    pub plan: PlanName,
    pub duration_days: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
    pub approved: bool,
    pub payment_method: PaymentMethod,
    pub reference: Option<PaymentReference>,
    pub proof_hash: Option<String>,
    pub amount_minor: i64,
    pub approved_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromotion {
    pub seller: SellerId,
    pub plan: PlanName,
    pub duration_days: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub reference: Option<PaymentReference>,
    pub proof_hash: Option<String>,
    pub amount_minor: i64,
    /// Whether the row starts live. Gateway and crypto submissions insert
    /// pending rows; reconciliation or admin approval flips them on.
    pub active: bool,
    pub approved: bool,
}

/// Result of an atomic promotion submission: either the inserted row, or the
/// end date of the promotion that blocked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(PromotionRecord),
    DuplicateActive { ends_at: DateTime<Utc> },
}

/// Result of an admin approval. Already-approved rows report as such instead
/// of erroring so the operation stays idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved(PromotionRecord),
    AlreadyApproved(PromotionRecord),
    /// Another promotion for the seller is live; the row stays pending.
    Blocked { ends_at: DateTime<Utc> },
}

/// Result of settling a gateway-paid promotion. The single-active guard
/// holds here as well as at submit time: a settled payment cannot put a
/// second promotion live for the same seller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated(PromotionRecord),
    AlreadyActive(PromotionRecord),
    Blocked { ends_at: DateTime<Utc> },
}

/// A seller surfaced by the featured listing. The average rating comes from
/// the external review system and is filled in by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturedSeller {
    pub seller: SellerId,
    pub shop_name: String,
    pub plan: PlanName,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    pub id: i64,
    pub seller: SellerId,
    pub reference: PaymentReference,
    pub amount_minor: i64,
    pub status: VerificationStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVerification {
    pub seller: SellerId,
    pub reference: PaymentReference,
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

/// One row per seller; renewals overwrite the dates in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub seller: SellerId,
    pub plan: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub reference: Option<PaymentReference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_carry_the_ledger_prefix() {
        let reference = PaymentReference::generate(ReferenceKind::Verification).unwrap();
        assert!(reference.as_str().starts_with("ALEBAZ-SVP-"));
        assert_eq!(reference.kind(), ReferenceKind::Verification);
        assert_eq!(
            reference.as_str().len(),
            "ALEBAZ-SVP-".len() + REFERENCE_TOKEN_BYTES * 2
        );
    }

    #[test]
    fn generated_references_are_unique() {
        let a = PaymentReference::generate(ReferenceKind::Promotion).unwrap();
        let b = PaymentReference::generate(ReferenceKind::Promotion).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn parse_routes_by_prefix() {
        let reference = PaymentReference::parse("ALEBAZ-SVP-XYZ").unwrap();
        assert_eq!(reference.kind(), ReferenceKind::Verification);
        assert_eq!(reference.as_str(), "ALEBAZ-SVP-XYZ");

        let reference = PaymentReference::parse("ALEBAZ-PRM-00aa11").unwrap();
        assert_eq!(reference.kind(), ReferenceKind::Promotion);

        let reference = PaymentReference::parse("ALEBAZ-SUB-42").unwrap();
        assert_eq!(reference.kind(), ReferenceKind::Subscription);
    }

    #[test]
    fn parse_rejects_unknown_prefixes_and_bad_tokens() {
        assert_eq!(
            PaymentReference::parse("STRIPE-XYZ"),
            Err(ReferenceFormatError::UnknownPrefix)
        );
        assert_eq!(
            PaymentReference::parse("ALEBAZ-PRM-"),
            Err(ReferenceFormatError::BadToken)
        );
        assert_eq!(
            PaymentReference::parse("ALEBAZ-PRM-abc def"),
            Err(ReferenceFormatError::BadToken)
        );
    }

    #[test]
    fn plan_names_round_trip_through_strings() {
        assert_eq!("standard".parse::<PlanName>().unwrap(), PlanName::Standard);
        assert_eq!(PlanName::Premium.to_string(), "premium");
        assert!("gold".parse::<PlanName>().is_err());
    }

    #[test]
    fn proof_hash_validation() {
        assert!(validate_proof_hash("0xABC").is_ok());
        assert!(validate_proof_hash("0xdeadbeef").is_ok());
        assert_eq!(
            validate_proof_hash("deadbeef"),
            Err(ProofHashError::MissingPrefix)
        );
        assert_eq!(validate_proof_hash("0x"), Err(ProofHashError::NonHex));
        assert_eq!(validate_proof_hash("0xzz"), Err(ProofHashError::NonHex));
    }
}

//! Static plan catalog: plan identifier to price and duration. Immutable at
//! runtime; everything here is a read-only lookup.

use chrono::Duration;

use crate::model::PlanName;

/// Fixed fee for the one-time seller identity verification, in minor units.
pub const VERIFICATION_FEE_MINOR: i64 = 250_000;

/// Price of the yearly seller subscription, in minor units.
pub const SUBSCRIPTION_YEARLY_PRICE_MINOR: i64 = 1_200_000;

/// Validity window of verifications and subscriptions.
pub const VALIDITY_DAYS: i64 = 365;

/// The single subscription plan currently sold.
pub const SUBSCRIPTION_PLAN: &str = "yearly";

/// Price and duration of a promotion plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSpec {
    pub price_minor: i64,
    pub duration_days: i32,
}

impl PlanName {
    pub fn spec(&self) -> PlanSpec {
        match self {
            PlanName::Basic => PlanSpec {
                price_minor: 500_000,
                duration_days: 7,
            },
            PlanName::Standard => PlanSpec {
                price_minor: 900_000,
                duration_days: 14,
            },
            PlanName::Premium => PlanSpec {
                price_minor: 1_500_000,
                duration_days: 30,
            },
        }
    }
}

/// Resolves a plan identifier supplied over the wire. Unknown identifiers
/// are a validation error, rejected before any mutation.
pub fn lookup_plan(name: &str) -> Option<(PlanName, PlanSpec)> {
    let plan: PlanName = name.parse().ok()?;
    Some((plan, plan.spec()))
}

/// One-year window used by verifications and subscriptions.
pub fn validity_window() -> Duration {
    Duration::days(VALIDITY_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_plan_runs_fourteen_days() {
        let (plan, spec) = lookup_plan("standard").expect("standard exists");
        assert_eq!(plan, PlanName::Standard);
        assert_eq!(spec.duration_days, 14);
    }

    #[test]
    fn unknown_plans_are_rejected() {
        assert!(lookup_plan("platinum").is_none());
        assert!(lookup_plan("").is_none());
    }

    #[test]
    fn durations_increase_with_tier() {
        assert!(PlanName::Basic.spec().duration_days < PlanName::Standard.spec().duration_days);
        assert!(PlanName::Standard.spec().duration_days < PlanName::Premium.spec().duration_days);
        assert!(PlanName::Basic.spec().price_minor < PlanName::Premium.spec().price_minor);
    }
}

//! Fire-and-forget seller notifications. Delivery (email/push) is an
//! external collaborator; a failed notification is logged and never fails
//! the operation that triggered it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{PlanName, SellerId};

/// Lifecycle events a seller is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellerEvent {
    PromotionSubmitted {
        plan: PlanName,
    },
    PromotionActivated {
        plan: PlanName,
        ends_at: DateTime<Utc>,
    },
    VerificationConfirmed {
        expires_at: DateTime<Utc>,
    },
    SubscriptionRenewed {
        expires_at: DateTime<Utc>,
    },
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait SellerNotifier: Send + Sync {
    async fn notify(&self, seller: SellerId, event: SellerEvent) -> Result<(), NotifyError>;
}

/// Sends the notification and swallows delivery failures with a warning.
pub async fn notify_best_effort<N>(notifier: &N, seller: SellerId, event: SellerEvent)
where
    N: SellerNotifier + ?Sized,
{
    if let Err(err) = notifier.notify(seller, event).await {
        warn!(seller = seller.get(), %err, "seller notification dropped");
    }
}

/// Default notifier: records the event in the log stream. Deployments wire a
/// real delivery channel behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl SellerNotifier for TracingNotifier {
    async fn notify(&self, seller: SellerId, event: SellerEvent) -> Result<(), NotifyError> {
        info!(seller = seller.get(), ?event, "seller notification");
        Ok(())
    }
}

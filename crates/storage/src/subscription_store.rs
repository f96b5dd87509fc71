use alebaz_domain::model::{PaymentReference, SellerId, SubscriptionRecord};
use alebaz_domain::plan::{validity_window, SUBSCRIPTION_PLAN};
use alebaz_domain::storage::{StorageError, StorageResult, SubscriptionStore};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::entity::subscriptions;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl SubscriptionStore for SeaOrmStorage {
    async fn find_subscription(
        &self,
        seller: &SellerId,
    ) -> StorageResult<Option<SubscriptionRecord>> {
        let maybe = subscriptions::Entity::find_by_id(seller.get())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        maybe.map(subscription_to_record).transpose()
    }

    async fn renew_subscription(
        &self,
        seller: &SellerId,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> StorageResult<SubscriptionRecord> {
        let expires_at = now + validity_window();
        let active = subscriptions::ActiveModel {
            seller_id: Set(seller.get()),
            plan: Set(SUBSCRIPTION_PLAN.to_string()),
            starts_at: Set(now),
            expires_at: Set(expires_at),
            active: Set(true),
            reference: Set(Some(reference.as_str().to_string())),
        };
        subscriptions::Entity::insert(active)
            .on_conflict(
                OnConflict::column(subscriptions::Column::SellerId)
                    .update_columns([
                        subscriptions::Column::Plan,
                        subscriptions::Column::StartsAt,
                        subscriptions::Column::ExpiresAt,
                        subscriptions::Column::Active,
                        subscriptions::Column::Reference,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;

        let stored = subscriptions::Entity::find_by_id(seller.get())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?
            .ok_or_else(|| StorageError::Database("subscription upsert lost its row".into()))?;
        subscription_to_record(stored)
    }

    async fn expire_due_subscriptions(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::Active, Expr::value(false))
            .filter(subscriptions::Column::Active.eq(true))
            .filter(subscriptions::Column::ExpiresAt.lt(now))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(result.rows_affected)
    }
}

fn subscription_to_record(model: subscriptions::Model) -> StorageResult<SubscriptionRecord> {
    let reference = model
        .reference
        .as_deref()
        .map(PaymentReference::parse)
        .transpose()
        .map_err(|err| StorageError::Database(err.to_string()))?;

    Ok(SubscriptionRecord {
        seller: SellerId::new(model.seller_id),
        plan: model.plan,
        starts_at: model.starts_at,
        expires_at: model.expires_at,
        active: model.active,
        reference,
    })
}

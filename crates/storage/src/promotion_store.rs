use alebaz_domain::model::{
    ActivationOutcome, ApprovalOutcome, FeaturedSeller, NewPromotion, PaymentReference,
    PromotionRecord, SellerId, SubmitOutcome,
};
use alebaz_domain::storage::{PromotionStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{
    Alias, Expr, PostgresQueryBuilder, Query, SimpleExpr, SqliteQueryBuilder,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, Statement, Value,
};

use crate::entity::{promotions, sellers};
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl PromotionStore for SeaOrmStorage {
    async fn submit_promotion(&self, promotion: NewPromotion) -> StorageResult<SubmitOutcome> {
        let backend = self.connection().get_database_backend();
        let seller_id = promotion.seller.get();
        let submitted_at = promotion.starts_at;

        // Guard and insert in one statement: the row lands only when the
        // seller holds no active promotion ending in the future.
        let guard = Query::select()
            .expr(Expr::val(1))
            .from(promotions::Entity)
            .and_where(promotions::Column::SellerId.eq(seller_id))
            .and_where(promotions::Column::Active.eq(true))
            .and_where(promotions::Column::EndsAt.gt(submitted_at))
            .to_owned();

        let values: Vec<Value> = vec![
            seller_id.into(),
            promotions::PlanDb::from(promotion.plan).into(),
            promotion.duration_days.into(),
            promotion.starts_at.into(),
            promotion.ends_at.into(),
            promotion.active.into(),
            promotion.approved.into(),
            promotions::PaymentMethodDb::from(promotion.payment_method).into(),
            promotion
                .reference
                .map(PaymentReference::into_inner)
                .into(),
            promotion.proof_hash.into(),
            promotion.amount_minor.into(),
            promotion.starts_at.into(),
        ];
        let mut source = Query::select();
        for value in values {
            source.expr(Expr::val(value));
        }
        source.and_where(Expr::exists(guard).not());

        let mut insert = Query::insert();
        insert
            .into_table(promotions::Entity)
            .columns([
                promotions::Column::SellerId,
                promotions::Column::Plan,
                promotions::Column::DurationDays,
                promotions::Column::StartsAt,
                promotions::Column::EndsAt,
                promotions::Column::Active,
                promotions::Column::Approved,
                promotions::Column::PaymentMethod,
                promotions::Column::Reference,
                promotions::Column::ProofHash,
                promotions::Column::AmountMinor,
                promotions::Column::CreatedAt,
            ])
            .select_from(source.to_owned())
            .map_err(StorageError::from_source)?
            .returning_all();

        let (sql, values) = match backend {
            DatabaseBackend::Sqlite => insert.build(SqliteQueryBuilder),
            DatabaseBackend::Postgres => insert.build(PostgresQueryBuilder),
            DatabaseBackend::MySql => unreachable!("mysql backend is not supported"),
        };
        let maybe_row = self.query_one_promotion(backend, sql, values).await?;

        match maybe_row {
            Some(model) => Ok(SubmitOutcome::Created(promotion_to_record(model)?)),
            None => {
                let blocking = promotions::Entity::find()
                    .filter(promotions::Column::SellerId.eq(seller_id))
                    .filter(promotions::Column::Active.eq(true))
                    .filter(promotions::Column::EndsAt.gt(submitted_at))
                    .order_by_desc(promotions::Column::EndsAt)
                    .one(self.connection())
                    .await
                    .map_err(StorageError::from_source)?;
                match blocking {
                    Some(existing) => Ok(SubmitOutcome::DuplicateActive {
                        ends_at: existing.ends_at,
                    }),
                    // The guard fired but the blocking row vanished before we
                    // could report it (concurrent expiry). Caller retries.
                    None => Err(StorageError::Database(
                        "promotion submission raced with a concurrent expiry".into(),
                    )),
                }
            }
        }
    }

    async fn approve_promotion(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<ApprovalOutcome>> {
        let backend = self.connection().get_database_backend();

        let mut query = Query::update();
        query.table(promotions::Entity);
        query.value(promotions::Column::Approved, true);
        query.value(promotions::Column::Active, true);
        query.value(promotions::Column::ApprovedAt, now);
        query.and_where(promotions::Column::Id.eq(id));
        query.and_where(promotions::Column::Approved.eq(false));
        query.and_where(no_other_live_promotion(now));
        query.returning_all();

        let (sql, values) = match backend {
            DatabaseBackend::Sqlite => query.build(SqliteQueryBuilder),
            DatabaseBackend::Postgres => query.build(PostgresQueryBuilder),
            DatabaseBackend::MySql => unreachable!("mysql backend is not supported"),
        };
        let maybe_row = self.query_one_promotion(backend, sql, values).await?;

        if let Some(model) = maybe_row {
            return Ok(Some(ApprovalOutcome::Approved(promotion_to_record(model)?)));
        }

        let current = promotions::Entity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        let Some(model) = current else {
            return Ok(None);
        };
        if model.approved {
            return Ok(Some(ApprovalOutcome::AlreadyApproved(promotion_to_record(
                model,
            )?)));
        }
        match self
            .find_blocking_promotion(model.seller_id, model.id, now)
            .await?
        {
            Some(ends_at) => Ok(Some(ApprovalOutcome::Blocked { ends_at })),
            None => Err(StorageError::Database(
                "promotion approval raced with a concurrent transition".into(),
            )),
        }
    }

    async fn find_promotion_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> StorageResult<Option<PromotionRecord>> {
        let maybe = promotions::Entity::find()
            .filter(promotions::Column::Reference.eq(reference.as_str()))
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        maybe.map(promotion_to_record).transpose()
    }

    async fn activate_promotion(
        &self,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<ActivationOutcome>> {
        let backend = self.connection().get_database_backend();

        let mut query = Query::update();
        query.table(promotions::Entity);
        query.value(promotions::Column::Active, true);
        query.value(promotions::Column::Approved, true);
        query.value(promotions::Column::ApprovedAt, now);
        query.and_where(promotions::Column::Reference.eq(reference.as_str()));
        query.and_where(promotions::Column::Active.eq(false));
        query.and_where(no_other_live_promotion(now));
        query.returning_all();

        let (sql, values) = match backend {
            DatabaseBackend::Sqlite => query.build(SqliteQueryBuilder),
            DatabaseBackend::Postgres => query.build(PostgresQueryBuilder),
            DatabaseBackend::MySql => unreachable!("mysql backend is not supported"),
        };
        let maybe_row = self.query_one_promotion(backend, sql, values).await?;

        if let Some(model) = maybe_row {
            return Ok(Some(ActivationOutcome::Activated(promotion_to_record(
                model,
            )?)));
        }

        let current = promotions::Entity::find()
            .filter(promotions::Column::Reference.eq(reference.as_str()))
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        let Some(model) = current else {
            return Ok(None);
        };
        if model.active {
            return Ok(Some(ActivationOutcome::AlreadyActive(promotion_to_record(
                model,
            )?)));
        }
        match self
            .find_blocking_promotion(model.seller_id, model.id, now)
            .await?
        {
            Some(ends_at) => Ok(Some(ActivationOutcome::Blocked { ends_at })),
            None => Err(StorageError::Database(
                "promotion activation raced with a concurrent transition".into(),
            )),
        }
    }

    async fn list_featured(&self, now: DateTime<Utc>) -> StorageResult<Vec<FeaturedSeller>> {
        let promos = promotions::Entity::find()
            .filter(promotions::Column::Active.eq(true))
            .filter(promotions::Column::Approved.eq(true))
            .filter(promotions::Column::StartsAt.lte(now))
            .filter(promotions::Column::EndsAt.gte(now))
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;

        if promos.is_empty() {
            return Ok(Vec::new());
        }

        let seller_ids: Vec<i64> = promos.iter().map(|p| p.seller_id).collect();
        let profiles = sellers::Entity::find()
            .filter(sellers::Column::Id.is_in(seller_ids))
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;

        let mut featured = Vec::with_capacity(promos.len());
        for promo in promos {
            let Some(profile) = profiles.iter().find(|s| s.id == promo.seller_id) else {
                continue;
            };
            featured.push(FeaturedSeller {
                seller: SellerId::new(promo.seller_id),
                shop_name: profile.shop_name.clone(),
                plan: promo.plan.into(),
                starts_at: promo.starts_at,
                ends_at: promo.ends_at,
                average_rating: None,
            });
        }
        Ok(featured)
    }

    async fn expire_due_promotions(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = promotions::Entity::update_many()
            .col_expr(promotions::Column::Active, Expr::value(false))
            .col_expr(promotions::Column::ExpiredAt, Expr::value(now))
            .filter(promotions::Column::Active.eq(true))
            .filter(promotions::Column::EndsAt.lt(now))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(result.rows_affected)
    }
}

/// `NOT EXISTS` predicate correlating on the updated row: the seller must
/// hold no other promotion with `active = true` ending after `now`. Shared
/// by the activation and approval statements so a settled payment or an
/// admin click cannot stack a second live promotion.
fn no_other_live_promotion(now: DateTime<Utc>) -> SimpleExpr {
    let other = Alias::new("other");
    let live = Query::select()
        .expr(Expr::val(1))
        .from_as(promotions::Entity, other.clone())
        .and_where(
            Expr::col((other.clone(), promotions::Column::SellerId))
                .equals((promotions::Entity, promotions::Column::SellerId)),
        )
        .and_where(Expr::col((other.clone(), promotions::Column::Active)).eq(true))
        .and_where(Expr::col((other.clone(), promotions::Column::EndsAt)).gt(now))
        .and_where(
            Expr::col((other, promotions::Column::Id))
                .not_equals((promotions::Entity, promotions::Column::Id)),
        )
        .to_owned();
    Expr::exists(live).not()
}

impl SeaOrmStorage {
    async fn find_blocking_promotion(
        &self,
        seller_id: i64,
        excluding: i64,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        let blocking = promotions::Entity::find()
            .filter(promotions::Column::SellerId.eq(seller_id))
            .filter(promotions::Column::Active.eq(true))
            .filter(promotions::Column::EndsAt.gt(now))
            .filter(promotions::Column::Id.ne(excluding))
            .order_by_desc(promotions::Column::EndsAt)
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(blocking.map(|row| row.ends_at))
    }

    async fn query_one_promotion(
        &self,
        backend: DatabaseBackend,
        sql: String,
        values: sea_orm::sea_query::Values,
    ) -> StorageResult<Option<promotions::Model>> {
        let stmt = Statement::from_sql_and_values(backend, sql, values);
        let maybe_row = self
            .connection()
            .query_one(stmt)
            .await
            .map_err(StorageError::from_source)?;
        match maybe_row {
            Some(row) => Ok(Some(
                promotions::Model::from_query_result(&row, "")
                    .map_err(StorageError::from_source)?,
            )),
            None => Ok(None),
        }
    }
}

pub(crate) fn promotion_to_record(model: promotions::Model) -> StorageResult<PromotionRecord> {
    let reference = model
        .reference
        .as_deref()
        .map(PaymentReference::parse)
        .transpose()
        .map_err(|err| StorageError::Database(err.to_string()))?;

    Ok(PromotionRecord {
        id: model.id,
        seller: SellerId::new(model.seller_id),
        plan: model.plan.into(),
        duration_days: model.duration_days,
        starts_at: model.starts_at,
        ends_at: model.ends_at,
        active: model.active,
        approved: model.approved,
        payment_method: model.payment_method.into(),
        reference,
        proof_hash: model.proof_hash,
        amount_minor: model.amount_minor,
        approved_at: model.approved_at,
        expired_at: model.expired_at,
        created_at: model.created_at,
    })
}

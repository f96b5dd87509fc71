use alebaz_domain::model::{
    NewVerification, PaymentReference, SellerId, VerificationRecord,
};
use alebaz_domain::plan::validity_window;
use alebaz_domain::storage::{StorageError, StorageResult, VerificationStore};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, PostgresQueryBuilder, Query, SqliteQueryBuilder};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait, FromQueryResult,
    QueryFilter, Set, Statement, TransactionTrait,
};

use crate::entity::sellers;
use crate::entity::verification_payments::{self, VerificationStatusDb};
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl VerificationStore for SeaOrmStorage {
    async fn create_verification(
        &self,
        verification: NewVerification,
    ) -> StorageResult<VerificationRecord> {
        let model = verification_payments::ActiveModel {
            seller_id: Set(verification.seller.get()),
            reference: Set(verification.reference.into_inner()),
            amount_minor: Set(verification.amount_minor),
            status: Set(VerificationStatusDb::Pending),
            created_at: Set(verification.created_at),
            ..Default::default()
        };
        let created = model
            .insert(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        verification_to_record(created)
    }

    async fn find_verification_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> StorageResult<Option<VerificationRecord>> {
        let maybe = verification_payments::Entity::find()
            .filter(verification_payments::Column::Reference.eq(reference.as_str()))
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        maybe.map(verification_to_record).transpose()
    }

    async fn confirm_verification(
        &self,
        reference: &PaymentReference,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<VerificationRecord>> {
        let ends_at = now + validity_window();
        let txn = self
            .connection()
            .begin()
            .await
            .map_err(StorageError::from_source)?;
        let backend = txn.get_database_backend();

        let mut query = Query::update();
        query.table(verification_payments::Entity);
        query.value(
            verification_payments::Column::Status,
            VerificationStatusDb::Success,
        );
        query.value(verification_payments::Column::PaidAt, now);
        query.value(verification_payments::Column::StartsAt, now);
        query.value(verification_payments::Column::EndsAt, ends_at);
        query.value(verification_payments::Column::ExpiresAt, ends_at);
        query.and_where(verification_payments::Column::Reference.eq(reference.as_str()));
        query.and_where(
            verification_payments::Column::Status.eq(VerificationStatusDb::Pending),
        );
        query.returning_all();

        let (sql, values) = match backend {
            DatabaseBackend::Sqlite => query.build(SqliteQueryBuilder),
            DatabaseBackend::Postgres => query.build(PostgresQueryBuilder),
            DatabaseBackend::MySql => unreachable!("mysql backend is not supported"),
        };
        let stmt = Statement::from_sql_and_values(backend, sql, values);
        let maybe_row = txn
            .query_one(stmt)
            .await
            .map_err(StorageError::from_source)?;

        let Some(row) = maybe_row else {
            // No pending row matched; nothing to commit.
            txn.rollback().await.map_err(StorageError::from_source)?;
            return Ok(None);
        };
        let updated = verification_payments::Model::from_query_result(&row, "")
            .map_err(StorageError::from_source)?;

        // The cached seller flag moves in the same transaction as the
        // payment status.
        sellers::Entity::update_many()
            .col_expr(sellers::Column::Verified, Expr::value(true))
            .filter(sellers::Column::Id.eq(updated.seller_id))
            .exec(&txn)
            .await
            .map_err(StorageError::from_source)?;

        txn.commit().await.map_err(StorageError::from_source)?;
        verification_to_record(updated).map(Some)
    }

    async fn fail_verification(
        &self,
        reference: &PaymentReference,
    ) -> StorageResult<Option<VerificationRecord>> {
        let backend = self.connection().get_database_backend();

        let mut query = Query::update();
        query.table(verification_payments::Entity);
        query.value(
            verification_payments::Column::Status,
            VerificationStatusDb::Failed,
        );
        query.and_where(verification_payments::Column::Reference.eq(reference.as_str()));
        query.and_where(
            verification_payments::Column::Status.eq(VerificationStatusDb::Pending),
        );
        query.returning_all();

        let (sql, values) = match backend {
            DatabaseBackend::Sqlite => query.build(SqliteQueryBuilder),
            DatabaseBackend::Postgres => query.build(PostgresQueryBuilder),
            DatabaseBackend::MySql => unreachable!("mysql backend is not supported"),
        };
        let stmt = Statement::from_sql_and_values(backend, sql, values);
        let maybe_row = self
            .connection()
            .query_one(stmt)
            .await
            .map_err(StorageError::from_source)?;

        match maybe_row {
            Some(row) => {
                let updated = verification_payments::Model::from_query_result(&row, "")
                    .map_err(StorageError::from_source)?;
                verification_to_record(updated).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn lapse_expired_verifications(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let expired = Query::select()
            .column(verification_payments::Column::SellerId)
            .from(verification_payments::Entity)
            .and_where(
                verification_payments::Column::Status.eq(VerificationStatusDb::Success),
            )
            .and_where(verification_payments::Column::ExpiresAt.lt(now))
            .to_owned();
        let unexpired = Query::select()
            .column(verification_payments::Column::SellerId)
            .from(verification_payments::Entity)
            .and_where(
                verification_payments::Column::Status.eq(VerificationStatusDb::Success),
            )
            .and_where(verification_payments::Column::ExpiresAt.gte(now))
            .to_owned();

        let result = sellers::Entity::update_many()
            .col_expr(sellers::Column::Verified, Expr::value(false))
            .filter(sellers::Column::Verified.eq(true))
            .filter(sellers::Column::Id.in_subquery(expired))
            .filter(sellers::Column::Id.not_in_subquery(unexpired))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(result.rows_affected)
    }
}

fn verification_to_record(
    model: verification_payments::Model,
) -> StorageResult<VerificationRecord> {
    let reference = PaymentReference::parse(&model.reference)
        .map_err(|err| StorageError::Database(err.to_string()))?;

    Ok(VerificationRecord {
        id: model.id,
        seller: SellerId::new(model.seller_id),
        reference,
        amount_minor: model.amount_minor,
        status: model.status.into(),
        starts_at: model.starts_at,
        ends_at: model.ends_at,
        expires_at: model.expires_at,
        paid_at: model.paid_at,
        created_at: model.created_at,
    })
}
